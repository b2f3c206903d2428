use std::{num::NonZero, time::Duration};

const DEFAULT_EVENT_QUEUE_CAPACITY: NonZero<usize> = match NonZero::new(64) {
	Some(capacity) => capacity,
	None => unreachable!(),
};

/// Tunables for a [`Session`](crate::Session)
///
/// All durations are deserialized from (fractional) seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize),
	serde(default, deny_unknown_fields, rename_all = "kebab-case")
)]
pub struct SessionConfig
{
	/// How long to wait between failed connection attempts.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub retry_interval: Duration,

	/// How long a single connection attempt may take.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub dial_timeout: Duration,

	/// How long a single read may block before we check for a new connection.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub read_timeout: Duration,

	/// How long writing a single frame may take before the connection is
	/// considered broken.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub write_timeout: Duration,

	/// How long a caller waits for a response, including sending the request.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub request_timeout: Duration,

	/// How long to wait between failed login attempts.
	#[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_duration"))]
	pub login_retry_delay: Duration,

	/// How many events may be buffered before new ones are dropped.
	pub event_queue_capacity: NonZero<usize>,

	/// Whether to send `admin.eventsEnabled true` after logging in.
	pub enable_events: bool,
}

impl SessionConfig
{
	pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self
	{
		self.retry_interval = retry_interval;
		self
	}

	pub const fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self
	{
		self.dial_timeout = dial_timeout;
		self
	}

	pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self
	{
		self.read_timeout = read_timeout;
		self
	}

	pub const fn with_write_timeout(mut self, write_timeout: Duration) -> Self
	{
		self.write_timeout = write_timeout;
		self
	}

	pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self
	{
		self.request_timeout = request_timeout;
		self
	}

	pub const fn with_login_retry_delay(mut self, login_retry_delay: Duration) -> Self
	{
		self.login_retry_delay = login_retry_delay;
		self
	}

	pub const fn with_event_queue_capacity(mut self, event_queue_capacity: NonZero<usize>) -> Self
	{
		self.event_queue_capacity = event_queue_capacity;
		self
	}

	pub const fn with_events_enabled(mut self, enable_events: bool) -> Self
	{
		self.enable_events = enable_events;
		self
	}
}

impl Default for SessionConfig
{
	fn default() -> Self
	{
		Self {
			retry_interval: Duration::from_secs(5),
			dial_timeout: Duration::from_secs(5),
			read_timeout: Duration::from_secs(5),
			write_timeout: Duration::from_secs(5),
			request_timeout: Duration::from_secs(10),
			login_retry_delay: Duration::ZERO,
			event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
			enable_events: true,
		}
	}
}

#[cfg(feature = "serde")]
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: serde::Deserializer<'de>,
{
	use serde::{Deserialize, de};

	f64::deserialize(deserializer)
		.and_then(|secs| Duration::try_from_secs_f64(secs).map_err(de::Error::custom))
}
