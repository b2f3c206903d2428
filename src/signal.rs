use std::error::Error;

use tokio::{select, signal::ctrl_c};

/// A shutdown signal from the OS
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal
{
	#[display("SIGINT")]
	Interrupt,

	#[display("SIGTERM")]
	Terminate,
}

/// Resolves once the OS asks us to shut down.
///
/// If we cannot listen for a signal, it is ignored rather than treated as
/// received.
pub(crate) async fn shutdown() -> Signal
{
	select! {
		() = interrupt() => Signal::Interrupt,
		() = terminate() => Signal::Terminate,
	}
}

async fn interrupt()
{
	if let Err(err) = ctrl_c().await {
		error!(error = &err as &dyn Error, "failed to listen for SIGINT");
		std::future::pending::<()>().await;
	}
}

#[cfg(unix)]
async fn terminate()
{
	use tokio::signal::unix::{SignalKind, signal};

	let mut signal = match signal(SignalKind::terminate()) {
		Ok(signal) => signal,
		Err(err) => {
			error!(error = &err as &dyn Error, "failed to listen for SIGTERM");
			return std::future::pending().await;
		},
	};

	if signal.recv().await.is_none() {
		warn!("cannot receive more SIGTERM signals");
		std::future::pending::<()>().await;
	}
}

#[cfg(not(unix))]
async fn terminate()
{
	std::future::pending().await
}
