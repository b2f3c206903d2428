//! Bookkeeping for in-flight requests
//!
//! Every request registers a single-slot channel under its sequence number
//! before it is sent. The frame reader delivers responses into those slots;
//! the requester removes its slot when it is done waiting, no matter how the
//! wait ended.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		MutexGuard,
		PoisonError,
		atomic::{self, AtomicU32},
	},
};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{wire::Sequence, word::Word};

/// Hands out sequence numbers, wrapping back to zero after [`Sequence::MAX`]
#[derive(Debug, Default)]
pub(crate) struct SequenceCounter
{
	next: AtomicU32,
}

impl SequenceCounter
{
	#[cfg(test)]
	pub(crate) const fn starting_at(sequence: Sequence) -> Self
	{
		Self { next: AtomicU32::new(sequence.get()) }
	}

	pub(crate) fn next(&self) -> Sequence
	{
		let previous = self
			.next
			.fetch_update(atomic::Ordering::Relaxed, atomic::Ordering::Relaxed, |next| {
				Some(Sequence::from_masked(next).wrapping_next().get())
			})
			.unwrap_or_else(|next| next);

		Sequence::from_masked(previous)
	}
}

/// Requests waiting for a response
#[derive(Debug, Default)]
pub(crate) struct PendingRequests
{
	slots: Mutex<HashMap<Sequence, mpsc::Sender<Vec<Word>>>>,
}

/// A registered slot in [`PendingRequests`]
///
/// The slot is removed when this guard is dropped.
#[derive(Debug)]
pub(crate) struct PendingGuard<'a>
{
	pending: &'a PendingRequests,
	sequence: Sequence,
	tx: mpsc::Sender<Vec<Word>>,
	rx: mpsc::Receiver<Vec<Word>>,
}

impl PendingRequests
{
	/// Registers a slot for `sequence`.
	///
	/// If a slot for `sequence` already exists (the counter wrapped around while
	/// a request was still waiting), it is replaced.
	pub(crate) fn register(&self, sequence: Sequence) -> PendingGuard<'_>
	{
		let (tx, rx) = mpsc::channel(1);

		if let Some(_stale) = self.slots().insert(sequence, tx.clone()) {
			warn!(%sequence, "replaced stale pending request");
		}

		PendingGuard { pending: self, sequence, tx, rx }
	}

	/// Delivers a response to whoever is waiting on `sequence`.
	///
	/// Never blocks. Responses nobody is waiting for are discarded.
	pub(crate) fn deliver(&self, sequence: Sequence, words: Vec<Word>) -> bool
	{
		let Some(tx) = self.slots().get(&sequence).cloned() else {
			trace!(%sequence, "discarding response for unknown request");
			return false;
		};

		match tx.try_send(words) {
			Ok(()) => true,
			Err(TrySendError::Full(_)) => {
				trace!(%sequence, "discarding duplicate response");
				false
			},
			Err(TrySendError::Closed(_)) => {
				trace!(%sequence, "discarding response for abandoned request");
				false
			},
		}
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize
	{
		self.slots().len()
	}

	fn slots(&self) -> MutexGuard<'_, HashMap<Sequence, mpsc::Sender<Vec<Word>>>>
	{
		self.slots.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl PendingGuard<'_>
{
	pub(crate) const fn sequence(&self) -> Sequence
	{
		self.sequence
	}

	/// Waits for the response.
	pub(crate) async fn response(&mut self) -> Option<Vec<Word>>
	{
		self.rx.recv().await
	}
}

impl Drop for PendingGuard<'_>
{
	fn drop(&mut self)
	{
		let mut slots = self.pending.slots();

		// the slot may have been taken over by a newer request
		if slots.get(&self.sequence).is_some_and(|tx| tx.same_channel(&self.tx)) {
			slots.remove(&self.sequence);
		}
	}
}
