use std::{error::Error, sync::Arc};

use tokio::{select, sync::watch, time};
use tokio_util::sync::CancellationToken;

use crate::{
	config::SessionConfig,
	connection::{self, Connection, CurrentConnection},
	error::RequestError,
	event::{EventQueue, EventStream},
	login::{self, LoginState},
	pending::{PendingRequests, SequenceCounter},
	reader,
	tasks::TaskManager,
	wire::{self, Direction},
	word::Word,
};

/// A handle to an RCON session
///
/// A session keeps itself connected and logged in for as long as it is open.
/// Handles are cheap to clone; the session is closed once [`Session::close()`]
/// is called or the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Session
{
	shared: Arc<Shared>,

	#[debug(skip)]
	_close_on_drop: Arc<CloseOnDrop>,
}

/// State shared between a session's handles and its background tasks
#[derive(Debug)]
pub(crate) struct Shared
{
	pub(crate) host: Arc<str>,

	#[debug(skip)]
	pub(crate) password: Box<str>,

	pub(crate) config: SessionConfig,
	pub(crate) connection: CurrentConnection,
	pub(crate) login: watch::Receiver<LoginState>,
	pub(crate) sequences: SequenceCounter,
	pub(crate) pending: PendingRequests,
	pub(crate) events: EventQueue,
	pub(crate) tasks: TaskManager,
	pub(crate) shutdown: CancellationToken,
}

#[derive(Debug)]
struct CloseOnDrop(TaskManager);

impl Drop for CloseOnDrop
{
	fn drop(&mut self)
	{
		self.0.cancel();
	}
}

/// Opens a session with the default [`SessionConfig`].
///
/// See [`dial_with_config()`].
pub fn dial(host: impl Into<Arc<str>>, password: impl Into<Box<str>>) -> (Session, EventStream)
{
	dial_with_config(host, password, SessionConfig::default())
}

/// Opens a session.
///
/// This returns immediately; connecting and logging in happen in the
/// background, and are retried until the session is closed. Progress is
/// reported through the returned [`EventStream`].
///
/// # Panics
///
/// This function must be called from within a Tokio runtime.
pub fn dial_with_config(
	host: impl Into<Arc<str>>,
	password: impl Into<Box<str>>,
	config: SessionConfig,
) -> (Session, EventStream)
{
	let host = host.into();
	let tasks = TaskManager::default();
	let (events, event_stream) = EventQueue::new(config.event_queue_capacity, tasks.cancellation_token());
	let (login_tx, login_rx) = watch::channel(LoginState::LoggingIn);
	let shared = Arc::new(Shared {
		host: Arc::clone(&host),
		password: password.into(),
		config,
		connection: CurrentConnection::new(),
		login: login_rx,
		sequences: SequenceCounter::default(),
		pending: PendingRequests::default(),
		events,
		tasks: tasks.clone(),
		shutdown: tasks.cancellation_token(),
	});

	tasks.spawn(info_span!("supervisor", %host), |cancellation_token| {
		connection::supervise(Arc::clone(&shared), cancellation_token)
	});

	tasks.spawn(info_span!("reader", %host), |cancellation_token| {
		reader::read_frames(Arc::clone(&shared), cancellation_token)
	});

	tasks.spawn(info_span!("login", %host), |cancellation_token| {
		login::keep_logged_in(Arc::clone(&shared), login_tx, cancellation_token)
	});

	let session = Session { shared, _close_on_drop: Arc::new(CloseOnDrop(tasks)) };

	(session, event_stream)
}

impl Session
{
	/// Sends a request once the session is logged in and waits for the
	/// response.
	///
	/// The configured request timeout covers waiting for a connection, for the
	/// login, and for the response.
	pub async fn request<I>(&self, words: I) -> Result<Vec<Word>, RequestError>
	where
		I: IntoIterator<Item: Into<Word>>,
	{
		self.shared.request(crate::words(words), true).await
	}

	/// Like [`Session::request()`], but does not wait for the login.
	///
	/// This is meant for the handful of commands the server accepts from
	/// unauthenticated clients.
	pub async fn request_public<I>(&self, words: I) -> Result<Vec<Word>, RequestError>
	where
		I: IntoIterator<Item: Into<Word>>,
	{
		self.shared.request(crate::words(words), false).await
	}

	/// Closes the session.
	///
	/// All pending and future requests fail with [`RequestError::Done`]. This
	/// does not wait for the background tasks to exit; see
	/// [`Session::shutdown()`] for that.
	pub fn close(&self)
	{
		if !self.shared.tasks.is_cancelled() {
			debug!(host = %self.shared.host, "closing session");
		}

		self.shared.tasks.cancel();
	}

	/// Closes the session and waits for all of its background tasks to exit.
	pub async fn shutdown(&self)
	{
		self.shared.tasks.shutdown().await;
	}

	/// The address this session connects to.
	pub fn host(&self) -> &str
	{
		&self.shared.host
	}

	/// Whether the session is currently logged in.
	pub fn is_logged_in(&self) -> bool
	{
		let LoginState::LoggedIn(id) = *self.shared.login.borrow() else {
			return false;
		};

		self.shared
			.connection
			.current()
			.is_some_and(|connection| connection.id() == id)
	}

	pub fn is_closed(&self) -> bool
	{
		self.shared.tasks.is_cancelled()
	}

	#[cfg(test)]
	pub(crate) fn current_connection(&self) -> Option<Connection>
	{
		self.shared.connection.current()
	}

	#[cfg(test)]
	pub(crate) fn pending_requests(&self) -> usize
	{
		self.shared.pending.len()
	}
}

impl Shared
{
	#[tracing::instrument(
		level = "debug",
		skip_all,
		fields(sequence = tracing::field::Empty, authenticated = wait_login),
		err(level = "debug"),
	)]
	async fn request(&self, words: Vec<Word>, wait_login: bool) -> Result<Vec<Word>, RequestError>
	{
		let mut pending = self.pending.register(self.sequences.next());
		let sequence = pending.sequence();

		tracing::Span::current().record("sequence", sequence.get());

		let frame = wire::encode(sequence.get(), Direction::Request, &words)?;
		let timeout = self.config.request_timeout;
		let exchange = async {
			self.send(&frame, wait_login).await?;
			pending.response().await.ok_or(RequestError::Done)
		};

		select! {
			biased;

			() = self.shutdown.cancelled() => Err(RequestError::Done),
			response = time::timeout(timeout, exchange) => {
				response.unwrap_or(Err(RequestError::Timeout { timeout }))
			},
		}
	}

	/// Writes `frame` to the current connection, retrying on whatever
	/// connection comes next if that fails.
	async fn send(&self, frame: &[u8], wait_login: bool) -> Result<(), RequestError>
	{
		loop {
			let Some(connection) = self.connection.get(&self.shutdown).await else {
				return Err(RequestError::Done);
			};

			if wait_login && !self.wait_for_login(&connection).await? {
				continue;
			}

			match connection.write(frame, self.config.write_timeout).await {
				Ok(()) => return Ok(()),
				Err(error) => {
					if !self.shutdown.is_cancelled() {
						warn!(
							connection.id = %connection.id(),
							error = &error as &dyn Error,
							"failed to send request; retrying",
						);
					}

					connection.report_broken();
				},
			}
		}
	}

	/// Waits until we are logged in on `connection`.
	///
	/// Returns `false` if `connection` broke first.
	async fn wait_for_login(&self, connection: &Connection) -> Result<bool, RequestError>
	{
		let mut login = self.login.clone();

		select! {
			biased;

			() = self.shutdown.cancelled() => Err(RequestError::Done),
			() = connection.broken() => Ok(false),
			logged_in = login.wait_for(|state| *state == LoginState::LoggedIn(connection.id())) => {
				logged_in.map(|_| true).map_err(|_| RequestError::Done)
			},
		}
	}
}
