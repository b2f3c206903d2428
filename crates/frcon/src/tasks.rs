use tokio::task;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;

/// Spawns and tracks a session's background tasks
#[derive(Debug, Default, Clone)]
pub(crate) struct TaskManager
{
	#[debug("{}", tasks.len())]
	tasks: TaskTracker,

	#[debug(skip)]
	cancellation_token: CancellationToken,
}

impl TaskManager
{
	/// Returns a token that is cancelled once [`TaskManager::cancel()`] is called.
	pub(crate) fn cancellation_token(&self) -> CancellationToken
	{
		self.cancellation_token.child_token()
	}

	pub(crate) fn is_cancelled(&self) -> bool
	{
		self.cancellation_token.is_cancelled()
	}

	pub(crate) fn spawn<F>(
		&self,
		span: tracing::Span,
		make_task: impl FnOnce(CancellationToken) -> F,
	) -> Option<task::JoinHandle<F::Output>>
	where
		F: IntoFuture,
		F::Output: Send + 'static,
		F::IntoFuture: Send + 'static,
	{
		if self.tasks.is_closed() {
			warn!(task = ?span.metadata().map(|metadata| metadata.name()), "task tracker has been closed");
			return None;
		}

		let current_span = tracing::Span::current();

		if !current_span.is_disabled() {
			span.follows_from(current_span);
		}

		let task = make_task(self.cancellation_token.child_token())
			.into_future()
			.instrument(span);

		Some(self.tasks.spawn(task))
	}

	/// Signals every task to stop without waiting for them.
	pub(crate) fn cancel(&self)
	{
		self.tasks.close();
		self.cancellation_token.cancel();
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub(crate) async fn shutdown(&self)
	{
		self.tasks.close();
		trace!("closed task tracker");

		self.cancellation_token.cancel();
		trace!("cancelled tasks");

		self.tasks.wait().await;
		trace!("all tasks have exited");
	}
}
