use std::{future::Future, time::Duration};

use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

/// Runs `attempt` until it yields a value, sleeping `delay` between attempts.
///
/// `attempt` receives the number of the current attempt, starting at 0. The
/// first attempt runs immediately.
///
/// Returns [`None`] as soon as `cancellation_token` is cancelled, whether that
/// happens during an attempt or while sleeping.
pub(crate) async fn retry_until_cancelled<T, F, Fut>(
	cancellation_token: &CancellationToken,
	delay: Duration,
	mut attempt: F,
) -> Option<T>
where
	F: FnMut(u64) -> Fut,
	Fut: Future<Output = Option<T>>,
{
	for attempt_number in 0_u64.. {
		if cancellation_token.is_cancelled() {
			return None;
		}

		select! {
			biased;

			() = cancellation_token.cancelled() => return None,
			output = attempt(attempt_number) => if let Some(output) = output {
				return Some(output);
			},
		}

		trace!(attempt = attempt_number, ?delay, "attempt failed; retrying");

		select! {
			biased;

			() = cancellation_token.cancelled() => return None,
			() = sleep(delay) => {},
		}
	}

	None
}
