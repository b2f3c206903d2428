//! The frame reader
//!
//! A single task per session reads from the current connection, reassembles
//! frames, and dispatches them: responses go to whoever is waiting for them,
//! everything else is a push from the server, which is emitted as an event
//! and acknowledged with `OK`.

use std::{error::Error, io, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
	connection::{Connection, ConnectionId},
	event::EventKind,
	session::Shared,
	wire::{self, Direction, Frame, FrameAssembler, MAX_FRAME_SIZE},
	word::Word,
};

pub(crate) async fn read_frames(shared: Arc<Shared>, cancellation_token: CancellationToken)
{
	let mut assembler = FrameAssembler::new();
	let mut buf = vec![0_u8; MAX_FRAME_SIZE].into_boxed_slice();
	let mut current_id = None::<ConnectionId>;

	while let Some(connection) = shared.connection.get(&cancellation_token).await {
		if current_id != Some(connection.id()) {
			assembler.reset();
			current_id = Some(connection.id());
		}

		let n = match connection.read(&mut buf, shared.config.read_timeout).await {
			Ok(0) => {
				bad_read(&shared, &connection, &mut assembler, "connection closed by peer");
				continue;
			},
			Ok(n) => n,
			Err(error) if error.kind() == io::ErrorKind::TimedOut => continue,
			Err(error) => {
				if !connection.is_broken() {
					warn!(connection.id = %connection.id(), error = &error as &dyn Error, "failed to read");
				}

				bad_read(&shared, &connection, &mut assembler, "read error");
				continue;
			},
		};

		assembler.extend(&buf[..n]);

		loop {
			match assembler.next_frame() {
				Ok(Some(frame)) => handle_frame(&shared, &connection, frame).await,
				Ok(None) => break,
				Err(error) => {
					warn!(connection.id = %connection.id(), error = &error as &dyn Error, "received malformed frame");
					bad_read(&shared, &connection, &mut assembler, "malformed frame");
					break;
				},
			}
		}
	}

	debug!("reader exiting");
}

fn bad_read(
	shared: &Shared,
	connection: &Connection,
	assembler: &mut FrameAssembler,
	reason: &'static str,
)
{
	assembler.reset();

	// somebody else already noticed
	if connection.is_broken() {
		return;
	}

	debug!(connection.id = %connection.id(), reason, "bad read");
	shared.events.emit(EventKind::BadRead, Vec::new());
	connection.report_broken();
}

async fn handle_frame(shared: &Shared, connection: &Connection, frame: Frame)
{
	let sequence = frame.header.sequence();

	if frame.header.is_response() {
		trace!(%sequence, words = ?frame.words, "received response");
		shared.pending.deliver(sequence, frame.words);
		return;
	}

	debug!(%sequence, words = ?frame.words, "received push");
	shared.events.emit(EventKind::Words, frame.words);

	// the sequence number belongs to this connection, so the ack is never retried
	let ack = match wire::encode(sequence.get(), Direction::Response, &[Word::OK]) {
		Ok(ack) => ack,
		Err(error) => {
			error!(%sequence, error = &error as &dyn Error, "failed to encode acknowledgement");
			return;
		},
	};

	if let Err(error) = connection.write(&ack, shared.config.write_timeout).await {
		warn!(
			connection.id = %connection.id(),
			%sequence,
			error = &error as &dyn Error,
			"failed to acknowledge push",
		);

		connection.report_broken();
	}
}
