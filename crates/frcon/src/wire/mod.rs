//! The RCON wire format
//!
//! Every message is a single frame: a 12-byte [`Header`] followed by a list of
//! length-prefixed, NUL-terminated [`Word`]s. All integers are little-endian.
//!
//! ```text
//! Header (12 bytes):
//!   u32 sequence_and_flags   // bit 31 = is_client, bit 30 = is_response
//!   u32 total_size_bytes     // header + all words
//!   u32 word_count
//! Word:
//!   u32 length
//!   byte[length] data
//!   byte 0x00                // not counted in `length`
//! ```
//!
//! Nothing in here performs I/O; see [`FrameAssembler`] for turning a stream
//! of bytes into frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub use self::{
	assembler::FrameAssembler,
	header::{Flags, Header},
};
use crate::word::Word;

mod assembler;
mod header;

/// The size of a frame [`Header`] in bytes.
pub const HEADER_SIZE: usize = 12;

/// The maximum size of a frame (header included) in bytes.
pub const MAX_FRAME_SIZE: usize = 0x4000;

/// The largest valid sequence number.
pub const SEQUENCE_MASK: u32 = 0x3FFF_FFFF;

/// length prefix + NUL terminator
const WORD_OVERHEAD: usize = 5;

/// A 30-bit sequence number used to correlate requests and responses
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("{_0}")]
pub struct Sequence(u32);

/// Which side of an exchange we are on when encoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction
{
	/// We are sending a request of our own.
	Request,

	/// We are answering a request the server sent us.
	Response,
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame
{
	pub header: Header,
	pub words: Vec<Word>,
}

/// Error returned by [`encode()`]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFrameError
{
	#[display("bad sequence number ({sequence} exceeds {SEQUENCE_MASK})")]
	BadSequence
	{
		#[error(ignore)]
		sequence: u32,
	},

	#[display("cannot encode a frame without any words")]
	NoWords,

	#[display("payload too long ({size} bytes exceeds the maximum of {MAX_FRAME_SIZE})")]
	PayloadTooLong
	{
		#[error(ignore)]
		size: usize,
	},
}

/// Error returned when an incoming frame is malformed
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFrameError
{
	#[display("declared frame size of {size} bytes exceeds the maximum of {MAX_FRAME_SIZE}")]
	FrameTooLarge
	{
		#[error(ignore)]
		size: u32,
	},

	#[display("declared frame size of {size} bytes is smaller than a header")]
	FrameTooSmall
	{
		#[error(ignore)]
		size: u32,
	},

	#[display("word #{index} extends past the end of the frame")]
	WordOverrun
	{
		#[error(ignore)]
		index: usize,
	},

	#[display("frame declares {declared} bytes but its words account for {consumed}")]
	SizeMismatch
	{
		declared: u32,
		consumed: usize,
	},
}

impl Sequence
{
	pub const ZERO: Self = Self(0);
	pub const MAX: Self = Self(SEQUENCE_MASK);

	/// Creates a new [`Sequence`], rejecting values that do not fit into 30 bits.
	pub const fn new(sequence: u32) -> Result<Self, EncodeFrameError>
	{
		if sequence > SEQUENCE_MASK {
			Err(EncodeFrameError::BadSequence { sequence })
		} else {
			Ok(Self(sequence))
		}
	}

	pub(crate) const fn from_masked(sequence: u32) -> Self
	{
		Self(sequence & SEQUENCE_MASK)
	}

	pub const fn get(self) -> u32
	{
		self.0
	}

	/// Returns the sequence number following this one, wrapping back to zero
	/// after [`Sequence::MAX`].
	pub const fn wrapping_next(self) -> Self
	{
		if self.0 == SEQUENCE_MASK { Self::ZERO } else { Self(self.0 + 1) }
	}
}

impl Direction
{
	pub const fn flags(self) -> Flags
	{
		match self {
			Direction::Request => Flags { is_client: true, is_response: false },
			Direction::Response => Flags { is_client: false, is_response: true },
		}
	}
}

/// Encodes a frame.
///
/// Requests we send ourselves carry the `is_client` flag; acknowledgements for
/// requests sent by the server carry the `is_response` flag.
pub fn encode(sequence: u32, direction: Direction, words: &[Word]) -> Result<Bytes, EncodeFrameError>
{
	encode_with_flags(sequence, direction.flags(), words)
}

/// Encodes a frame with arbitrary [`Flags`].
///
/// This is mostly useful for implementing the server side of the protocol.
pub fn encode_with_flags(
	sequence: u32,
	flags: Flags,
	words: &[Word],
) -> Result<Bytes, EncodeFrameError>
{
	let sequence = Sequence::new(sequence)?;

	if words.is_empty() {
		return Err(EncodeFrameError::NoWords);
	}

	let size = words
		.iter()
		.try_fold(HEADER_SIZE, |size, word| size.checked_add(WORD_OVERHEAD + word.len()))
		.unwrap_or(usize::MAX);

	if size > MAX_FRAME_SIZE {
		return Err(EncodeFrameError::PayloadTooLong { size });
	}

	let too_long = |_| EncodeFrameError::PayloadTooLong { size };
	let word_count = u32::try_from(words.len()).map_err(too_long)?;
	let header = Header::new(sequence, flags, u32::try_from(size).map_err(too_long)?, word_count);
	let mut buf = BytesMut::with_capacity(size);

	header.write_to(&mut buf);

	for word in words {
		buf.put_u32_le(u32::try_from(word.len()).map_err(too_long)?);
		buf.put_slice(word.as_bytes());
		buf.put_u8(0);
	}

	debug_assert_eq!(buf.len(), size);

	Ok(buf.freeze())
}

/// Decodes the words of a frame.
///
/// `body` must contain exactly the bytes following `header`, i.e.
/// `header.size() - HEADER_SIZE` bytes.
pub fn decode_words(header: &Header, body: Bytes) -> Result<Vec<Word>, DecodeFrameError>
{
	let word_count = header.word_count() as usize;
	let body_len = body.len();
	let mut words = Vec::with_capacity(word_count.min(body_len / WORD_OVERHEAD));
	let mut rest = body;

	for index in 0..word_count {
		if rest.len() < 4 {
			return Err(DecodeFrameError::WordOverrun { index });
		}

		let len = rest.get_u32_le() as usize;

		// the word itself + its NUL terminator
		if len >= rest.len() {
			return Err(DecodeFrameError::WordOverrun { index });
		}

		words.push(Word::from(rest.split_to(len)));
		rest.advance(1);
	}

	if !rest.is_empty() {
		return Err(DecodeFrameError::SizeMismatch {
			declared: header.size(),
			consumed: HEADER_SIZE + body_len - rest.len(),
		});
	}

	Ok(words)
}
