
use bytes::{BufMut, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::U32};

use super::{HEADER_SIZE, SEQUENCE_MASK, Sequence};

const IS_CLIENT_BIT: u32 = 0x8000_0000;
const IS_RESPONSE_BIT: u32 = 0x4000_0000;

/// The header as it is laid out on the wire
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct RawHeader
{
	sequence: U32,
	size: U32,
	word_count: U32,
}

/// The fixed-size header preceding every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header
{
	/// sequence number + flags
	sequence: u32,

	/// total size of the frame, including this header
	size: u32,

	/// number of words following this header
	word_count: u32,
}

/// The direction bits stored in the upper two bits of the sequence field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags
{
	/// Whether the exchange this frame belongs to was initiated by the client.
	pub is_client: bool,

	/// Whether this frame is a response.
	pub is_response: bool,
}

impl Header
{
	pub(crate) const fn new(sequence: Sequence, flags: Flags, size: u32, word_count: u32) -> Self
	{
		let mut raw = sequence.get();

		if flags.is_client {
			raw |= IS_CLIENT_BIT;
		}

		if flags.is_response {
			raw |= IS_RESPONSE_BIT;
		}

		Self { sequence: raw, size, word_count }
	}

	/// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
	///
	/// Returns [`None`] if there are not enough bytes yet.
	pub fn parse(bytes: &[u8]) -> Option<Self>
	{
		let (raw, _) = RawHeader::read_from_prefix(bytes).ok()?;

		Some(Self {
			sequence: raw.sequence.get(),
			size: raw.size.get(),
			word_count: raw.word_count.get(),
		})
	}

	pub(crate) fn write_to(&self, buf: &mut BytesMut)
	{
		let raw = RawHeader {
			sequence: U32::new(self.sequence),
			size: U32::new(self.size),
			word_count: U32::new(self.word_count),
		};

		buf.put_slice(raw.as_bytes());
	}

	pub const fn sequence(&self) -> Sequence
	{
		Sequence::from_masked(self.sequence & SEQUENCE_MASK)
	}

	pub const fn flags(&self) -> Flags
	{
		Flags { is_client: self.is_client(), is_response: self.is_response() }
	}

	pub const fn is_client(&self) -> bool
	{
		self.sequence & IS_CLIENT_BIT != 0
	}

	pub const fn is_response(&self) -> bool
	{
		self.sequence & IS_RESPONSE_BIT != 0
	}

	/// The total size of the frame in bytes, header included.
	pub const fn size(&self) -> u32
	{
		self.size
	}

	pub const fn word_count(&self) -> u32
	{
		self.word_count
	}

	/// The number of bytes following the header, if the declared size is sane.
	pub(crate) fn body_len(&self) -> Option<usize>
	{
		(self.size as usize).checked_sub(HEADER_SIZE)
	}
}
