//! Session events
//!
//! Everything noteworthy that happens during the lifetime of a session is
//! reported as an [`Event`] through the session's [`EventStream`]: connection
//! state changes, login results, and the push messages the server sends on its
//! own.
//!
//! The queue feeding the stream is bounded. Emitting an event never blocks; if
//! the consumer falls behind, new events are dropped and the consumer will
//! receive a single [`Lagged`] event reporting how many it missed, as soon as
//! there is room again.
//!
//! [`Lagged`]: EventKind::Lagged

use std::{
	future::Future,
	iter,
	num::NonZero,
	pin::Pin,
	sync::{Mutex, PoisonError},
	task::{Context, Poll},
};

use futures_util::{Stream, StreamExt};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::word::Word;

/// A session event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event
{
	pub kind: EventKind,

	/// When the event was observed.
	pub timestamp: OffsetDateTime,

	/// The words of a server push. Empty for every other kind of event.
	pub words: Vec<Word>,
}

/// The different kinds of [`Event`]s
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind
{
	/// `words` - The server sent us a message on its own.
	Words,

	/// `connected` - A new connection has been established.
	Connected,

	/// `logged-in` - We successfully authenticated on the current connection.
	LoggedIn,

	/// `disconnected` - The current connection has been torn down.
	Disconnected,

	/// `bad-password` - The server rejected our password.
	BadPassword,

	/// `bad-read` - Reading from the current connection failed.
	BadRead,

	/// `lagged` - You missed events because you consumed them too slowly.
	Lagged
	{
		/// The number of events that were skipped
		skipped: u64,
	},
}

impl Event
{
	pub(crate) fn new(kind: EventKind, words: Vec<Word>) -> Self
	{
		Self { kind, timestamp: OffsetDateTime::now_utc(), words }
	}
}

impl EventKind
{
	/// Returns the name of the event kind.
	pub const fn name(&self) -> &'static str
	{
		match *self {
			EventKind::Words => "words",
			EventKind::Connected => "connected",
			EventKind::LoggedIn => "logged-in",
			EventKind::Disconnected => "disconnected",
			EventKind::BadPassword => "bad-password",
			EventKind::BadRead => "bad-read",
			EventKind::Lagged { .. } => "lagged",
		}
	}
}

/// The sending half of a session's event queue
#[derive(Debug)]
pub(crate) struct EventQueue
{
	tx: mpsc::Sender<Event>,

	/// events dropped since the last successful delivery
	skipped: Mutex<u64>,
}

/// A [`Stream`] of [`Event`]s
///
/// The stream ends once the session it belongs to has been closed.
#[derive(Debug)]
#[must_use = "events are discarded if nobody consumes them"]
pub struct EventStream
{
	rx: mpsc::Receiver<Event>,

	#[debug(skip)]
	closed: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl EventQueue
{
	pub(crate) fn new(capacity: NonZero<usize>, closed: CancellationToken) -> (Self, EventStream)
	{
		let (tx, rx) = mpsc::channel(capacity.get());
		let queue = Self { tx, skipped: Mutex::new(0) };
		let stream = EventStream { rx, closed: Box::pin(closed.cancelled_owned()) };

		(queue, stream)
	}

	/// Emits an event without blocking.
	pub(crate) fn emit(&self, kind: EventKind, words: Vec<Word>)
	{
		let event = Event::new(kind, words);
		let mut skipped = self.skipped.lock().unwrap_or_else(PoisonError::into_inner);

		if *skipped == 0 {
			match self.tx.try_send(event) {
				Ok(()) => trace!(event = kind.name(), "emitted event"),
				Err(TrySendError::Full(_)) => {
					debug!(event = kind.name(), "event queue is full; dropping event");
					*skipped = 1;
				},
				Err(TrySendError::Closed(_)) => {
					trace!(event = kind.name(), "no event listener");
				},
			}

			return;
		}

		match self.tx.try_reserve_many(2) {
			Ok(permits) => {
				let lagged = Event::new(EventKind::Lagged { skipped: *skipped }, Vec::new());

				for (permit, event) in iter::zip(permits, [lagged, event]) {
					permit.send(event);
				}

				debug!(skipped = *skipped, "consumer caught up");
				*skipped = 0;
			},
			Err(TrySendError::Full(())) => match self.tx.try_reserve() {
				// only room for one; report this event as skipped too
				Ok(permit) => {
					*skipped += 1;
					permit.send(Event::new(EventKind::Lagged { skipped: *skipped }, Vec::new()));
					debug!(skipped = *skipped, "consumer caught up");
					*skipped = 0;
				},
				Err(TrySendError::Full(())) => *skipped += 1,
				Err(TrySendError::Closed(())) => {
					trace!(event = kind.name(), "no event listener");
				},
			},
			Err(TrySendError::Closed(())) => {
				trace!(event = kind.name(), "no event listener");
			},
		}
	}
}

impl EventStream
{
	/// Waits for the next event.
	///
	/// Returns [`None`] once the session has been closed.
	pub async fn recv(&mut self) -> Option<Event>
	{
		self.next().await
	}
}

impl Stream for EventStream
{
	type Item = Event;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>>
	{
		let this = self.get_mut();

		if let Poll::Ready(event) = this.rx.poll_recv(cx) {
			return Poll::Ready(event);
		}

		this.closed.as_mut().poll(cx).map(|()| None)
	}
}
