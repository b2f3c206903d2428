//! The login keeper
//!
//! Every new connection starts out unauthenticated. As soon as the supervisor
//! publishes one, this task runs the `login.hashed` challenge-response
//! handshake on it, enables server events, and then marks the session as
//! logged in on that connection. Requests that require authentication wait
//! for exactly that.
//!
//! Handshake requests are pinned to the connection they started on: if it
//! breaks midway, the whole handshake is repeated on the next connection.

use std::{error::Error, io, sync::Arc};

use tokio::{select, sync::watch, time};
use tokio_util::sync::CancellationToken;

use self::challenge::{Challenge, ParseChallengeError, PasswordHash};
use crate::{
	connection::{Connection, ConnectionId},
	event::EventKind,
	retry::retry_until_cancelled,
	session::Shared,
	wire::{self, Direction, EncodeFrameError},
	word::{Word, words},
};

mod challenge;

/// Whether the session is authenticated, and on which connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginState
{
	LoggingIn,
	LoggedIn(ConnectionId),
}

/// Why a login attempt failed
#[derive(Debug, Display, Error, From)]
enum AttemptError
{
	#[display("failed to encode request: {_0}")]
	#[from]
	Encode(EncodeFrameError),

	#[display("failed to send request: {_0}")]
	#[from]
	Send(io::Error),

	#[display("timed out waiting for a response")]
	Timeout,

	#[display("connection lost")]
	ConnectionLost,

	#[display("unexpected response {words:?}")]
	UnexpectedResponse
	{
		#[error(ignore)]
		words: Vec<Word>,
	},

	#[display("malformed challenge: {_0}")]
	#[from]
	BadChallenge(ParseChallengeError),

	#[display("server rejected our password")]
	BadPassword,
}

/// How a sequence of login attempts on one connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome
{
	LoggedIn,
	ConnectionLost,
}

pub(crate) async fn keep_logged_in(
	shared: Arc<Shared>,
	login_state: watch::Sender<LoginState>,
	cancellation_token: CancellationToken,
)
{
	let mut logged_in_on = None::<ConnectionId>;

	while let Some(connection) = shared
		.connection
		.get_where(&cancellation_token, |connection| Some(connection.id()) != logged_in_on)
		.await
	{
		login_state.send_replace(LoginState::LoggingIn);
		debug!(connection.id = %connection.id(), "logging in");

		let outcome =
			retry_until_cancelled(&cancellation_token, shared.config.login_retry_delay, |attempt| {
				login(&shared, &connection, attempt)
			})
			.await;

		match outcome {
			None => break,
			Some(Outcome::ConnectionLost) => {
				debug!(connection.id = %connection.id(), "connection lost while logging in");
			},
			Some(Outcome::LoggedIn) => {
				info!(connection.id = %connection.id(), "logged in");
				logged_in_on = Some(connection.id());
				login_state.send_replace(LoginState::LoggedIn(connection.id()));
				shared.events.emit(EventKind::LoggedIn, Vec::new());
			},
		}
	}

	login_state.send_replace(LoginState::LoggingIn);
	debug!("login keeper exiting");
}

/// A single login attempt.
///
/// Returns [`None`] if the attempt should be retried on the same connection.
async fn login(shared: &Shared, connection: &Connection, attempt: u64) -> Option<Outcome>
{
	match handshake(shared, connection).await {
		Ok(()) => Some(Outcome::LoggedIn),
		Err(AttemptError::BadPassword) => {
			warn!(connection.id = %connection.id(), attempt, "server rejected our password");
			shared.events.emit(EventKind::BadPassword, Vec::new());
			None
		},
		Err(_) if connection.is_broken() => Some(Outcome::ConnectionLost),
		Err(error) => {
			warn!(
				connection.id = %connection.id(),
				attempt,
				error = &error as &dyn Error,
				"login attempt failed",
			);

			None
		},
	}
}

async fn handshake(shared: &Shared, connection: &Connection) -> Result<(), AttemptError>
{
	let response = exchange_on(shared, connection, vec![Word::from_static("login.hashed")]).await?;
	let challenge = match response.as_slice() {
		[ok, challenge, ..] if *ok == Word::OK => {
			challenge.to_str().ok().map(str::parse::<Challenge>)
		},
		_ => None,
	};

	let Some(challenge) = challenge else {
		return Err(AttemptError::UnexpectedResponse { words: response });
	};

	let hash = PasswordHash::new(&challenge?, &shared.password);
	let response = exchange_on(shared, connection, vec![
		Word::from_static("login.hashed"),
		Word::from(hash.to_string()),
	])
	.await?;

	if response != [Word::OK] {
		return Err(AttemptError::BadPassword);
	}

	if !shared.config.enable_events {
		return Ok(());
	}

	let response = exchange_on(shared, connection, words(["admin.eventsEnabled", "true"])).await?;

	if response != [Word::OK] {
		return Err(AttemptError::UnexpectedResponse { words: response });
	}

	Ok(())
}

/// Sends a request on `connection` specifically and waits for its response.
async fn exchange_on(
	shared: &Shared,
	connection: &Connection,
	words: Vec<Word>,
) -> Result<Vec<Word>, AttemptError>
{
	let mut pending = shared.pending.register(shared.sequences.next());
	let frame = wire::encode(pending.sequence().get(), Direction::Request, &words)?;
	let exchange = async {
		connection.write(&frame, shared.config.write_timeout).await?;
		pending.response().await.ok_or(AttemptError::ConnectionLost)
	};

	select! {
		biased;

		() = connection.broken() => Err(AttemptError::ConnectionLost),
		response = time::timeout(shared.config.request_timeout, exchange) => {
			response.unwrap_or(Err(AttemptError::Timeout))
		},
	}
}
