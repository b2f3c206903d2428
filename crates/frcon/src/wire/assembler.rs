use bytes::{Buf, BytesMut};

use super::{DecodeFrameError, Frame, HEADER_SIZE, Header, MAX_FRAME_SIZE, decode_words};

/// Reassembles frames from a stream of bytes
///
/// Bytes can be fed in arbitrarily sized chunks; [`FrameAssembler::next_frame()`]
/// will only yield a frame once all of its bytes have arrived.
///
/// After an error the assembler is in an unspecified state and should be
/// [reset](FrameAssembler::reset) together with the connection it was reading from.
#[derive(Debug, Default)]
pub struct FrameAssembler
{
	buffer: BytesMut,

	/// header of the frame we are currently waiting on
	header: Option<Header>,
}

impl FrameAssembler
{
	pub fn new() -> Self
	{
		Self::default()
	}

	/// Appends newly received bytes.
	pub fn extend(&mut self, bytes: &[u8])
	{
		self.buffer.extend_from_slice(bytes);
	}

	/// Tries to extract the next complete frame.
	///
	/// Returns `Ok(None)` if more bytes are needed.
	pub fn next_frame(&mut self) -> Result<Option<Frame>, DecodeFrameError>
	{
		let header = match self.header {
			Some(header) => header,
			None => {
				let Some(header) = Header::parse(&self.buffer) else {
					return Ok(None);
				};

				let size = header.size();

				if size as usize > MAX_FRAME_SIZE {
					return Err(DecodeFrameError::FrameTooLarge { size });
				}

				if (size as usize) < HEADER_SIZE {
					return Err(DecodeFrameError::FrameTooSmall { size });
				}

				self.buffer.advance(HEADER_SIZE);
				*self.header.insert(header)
			},
		};

		let Some(body_len) = header.body_len() else {
			return Err(DecodeFrameError::FrameTooSmall { size: header.size() });
		};

		if self.buffer.len() < body_len {
			self.buffer.reserve(body_len - self.buffer.len());
			return Ok(None);
		}

		self.header = None;

		let body = self.buffer.split_to(body_len).freeze();
		let words = decode_words(&header, body)?;

		Ok(Some(Frame { header, words }))
	}

	/// Discards all buffered state.
	pub fn reset(&mut self)
	{
		self.buffer.clear();
		self.header = None;
	}

	/// The number of bytes received but not yet consumed as part of a frame.
	pub fn buffered(&self) -> usize
	{
		self.buffer.len() + self.header.map_or(0, |_| HEADER_SIZE)
	}
}
