use std::time::Duration;

use crate::wire::EncodeFrameError;

/// Error returned by [`Session::request()`] and [`Session::request_public()`]
///
/// [`Session::request()`]: crate::Session::request
/// [`Session::request_public()`]: crate::Session::request_public
#[derive(Debug, Display, Error, From)]
pub enum RequestError
{
	/// The request could not be encoded.
	#[display("{_0}")]
	#[from]
	Encode(EncodeFrameError),

	/// No response arrived in time.
	#[display("request timed out after {timeout:?}")]
	Timeout
	{
		#[error(ignore)]
		timeout: Duration,
	},

	/// The session has been closed.
	#[display("session closed")]
	Done,
}

impl RequestError
{
	pub const fn is_timeout(&self) -> bool
	{
		matches!(self, Self::Timeout { .. })
	}

	pub const fn is_done(&self) -> bool
	{
		matches!(self, Self::Done)
	}
}
