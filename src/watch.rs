//! The `watch` command

use frcon::{Event, EventKind, EventStream};
use time::format_description::well_known::Rfc3339;
use tokio::select;

use crate::signal;

/// Logs events until the session ends or we are asked to shut down.
pub(crate) async fn run(events: EventStream)
{
	select! {
		signal = signal::shutdown() => info!(%signal, "shutting down"),
		() = log_events(events) => info!("session closed"),
	}
}

/// Logs every event in `events` until the stream ends.
pub(crate) async fn log_events(mut events: EventStream)
{
	while let Some(event) = events.recv().await {
		log_event(&event);
	}
}

fn log_event(event: &Event)
{
	let kind = event.kind.name();
	let timestamp = event.timestamp.format(&Rfc3339).unwrap_or_default();

	match event.kind {
		EventKind::Words => info!(kind, %timestamp, words = ?event.words, "server message"),
		EventKind::Connected => info!(kind, %timestamp, "connected"),
		EventKind::LoggedIn => info!(kind, %timestamp, "logged in"),
		EventKind::Disconnected => warn!(kind, %timestamp, "disconnected"),
		EventKind::BadRead => warn!(kind, %timestamp, "failed to read from connection"),
		EventKind::BadPassword => error!(kind, %timestamp, "server rejected the password"),
		EventKind::Lagged { skipped } => {
			warn!(kind, %timestamp, skipped, "fell behind and missed events");
		},
		_ => debug!(kind, %timestamp, "unknown event"),
	}
}
