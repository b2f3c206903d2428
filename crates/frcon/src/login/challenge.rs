//! Password hashing for the `login.hashed` handshake
//!
//! The server hands out a random challenge as a hex string. We prove that we
//! know the password by sending back `MD5(challenge || password)` as an
//! uppercase hex string.

use std::{fmt, str::FromStr};

use md5::{Digest, Md5};

/// The number of bytes that make up a [`PasswordHash`]
const RAW_LEN: usize = 16_usize;

/// A login challenge sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Challenge
{
	bytes: Box<[u8]>,
}

/// Error for parsing strings into [`Challenge`]s
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseChallengeError
{
	#[display("invalid length; expected an even number of hex digits but got {got}")]
	OddLength
	{
		#[error(ignore)]
		got: usize,
	},

	#[display("invalid hex digit at position {position}")]
	InvalidHexDigit
	{
		#[error(ignore)]
		position: usize,
	},
}

/// The response to a [`Challenge`]
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct PasswordHash
{
	bytes: [u8; RAW_LEN],
}

impl FromStr for Challenge
{
	type Err = ParseChallengeError;

	fn from_str(value: &str) -> Result<Self, Self::Err>
	{
		if value.len() % 2 != 0 {
			return Err(ParseChallengeError::OddLength { got: value.len() });
		}

		let bytes = value
			.as_bytes()
			.chunks_exact(2)
			.enumerate()
			.map(|(idx, pair)| {
				let high = parse_hex_digit(pair[0], idx * 2)?;
				let low = parse_hex_digit(pair[1], idx * 2 + 1)?;

				Ok((high << 4) | low)
			})
			.collect::<Result<Box<[u8]>, ParseChallengeError>>()?;

		Ok(Self { bytes })
	}
}

fn parse_hex_digit(digit: u8, position: usize) -> Result<u8, ParseChallengeError>
{
	char::from(digit)
		.to_digit(16)
		.and_then(|digit| u8::try_from(digit).ok())
		.ok_or(ParseChallengeError::InvalidHexDigit { position })
}

impl PasswordHash
{
	/// Computes the response to `challenge`.
	pub(crate) fn new(challenge: &Challenge, password: &str) -> Self
	{
		let mut hasher = Md5::default();
		hasher.update(&challenge.bytes);
		hasher.update(password.as_bytes());

		Self { bytes: hasher.finalize().into() }
	}
}

impl fmt::Debug for PasswordHash
{
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		fmt.debug_tuple("PasswordHash").field(&format_args!("{self}")).finish()
	}
}

impl fmt::Display for PasswordHash
{
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		self.bytes.iter().try_for_each(|byte| write!(fmt, "{byte:02X}"))
	}
}
