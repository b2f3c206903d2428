//! Words
//!
//! Every frame carries a list of [`Word`]s. Commands, their arguments, and the
//! server's responses are all expressed as words. On the wire a word is an
//! arbitrary byte string; most of them happen to be ASCII.

use std::{borrow::Cow, fmt, str};

use bytes::Bytes;

/// A single protocol word
///
/// Cloning a [`Word`] is cheap, as the underlying buffer is reference counted.
#[derive(Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Word(Bytes);

impl Word
{
	/// The `OK` word servers use to signal success.
	pub const OK: Self = Self::from_static("OK");

	/// Creates a [`Word`] from a string literal without allocating.
	pub const fn from_static(word: &'static str) -> Self
	{
		Self(Bytes::from_static(word.as_bytes()))
	}

	/// Returns the raw bytes of this word.
	pub fn as_bytes(&self) -> &[u8]
	{
		&self.0[..]
	}

	/// Returns the word as a string, if it is valid UTF-8.
	pub fn to_str(&self) -> Result<&str, str::Utf8Error>
	{
		str::from_utf8(self.as_bytes())
	}

	/// Returns the word as a string, replacing invalid UTF-8 sequences.
	pub fn to_string_lossy(&self) -> Cow<'_, str>
	{
		String::from_utf8_lossy(self.as_bytes())
	}

	/// The length of the word in bytes (excluding the NUL terminator).
	pub fn len(&self) -> usize
	{
		self.0.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.0.is_empty()
	}
}

impl fmt::Debug for Word
{
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		fmt::Debug::fmt(&*self.to_string_lossy(), fmt)
	}
}

impl fmt::Display for Word
{
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		fmt.write_str(&self.to_string_lossy())
	}
}

impl From<&str> for Word
{
	fn from(word: &str) -> Self
	{
		Self(Bytes::copy_from_slice(word.as_bytes()))
	}
}

impl From<String> for Word
{
	fn from(word: String) -> Self
	{
		Self(Bytes::from(word))
	}
}

impl From<Box<str>> for Word
{
	fn from(word: Box<str>) -> Self
	{
		Self::from(String::from(word))
	}
}

impl From<Vec<u8>> for Word
{
	fn from(word: Vec<u8>) -> Self
	{
		Self(Bytes::from(word))
	}
}

impl From<Bytes> for Word
{
	fn from(word: Bytes) -> Self
	{
		Self(word)
	}
}

impl PartialEq<str> for Word
{
	fn eq(&self, other: &str) -> bool
	{
		self.as_bytes() == other.as_bytes()
	}
}

impl PartialEq<&str> for Word
{
	fn eq(&self, other: &&str) -> bool
	{
		self.as_bytes() == other.as_bytes()
	}
}

impl AsRef<[u8]> for Word
{
	fn as_ref(&self) -> &[u8]
	{
		self.as_bytes()
	}
}

/// Collects anything word-like into a list of [`Word`]s.
pub fn words<I>(words: I) -> Vec<Word>
where
	I: IntoIterator<Item: Into<Word>>,
{
	words.into_iter().map(Into::into).collect()
}
