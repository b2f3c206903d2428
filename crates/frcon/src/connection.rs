//! The connection supervisor
//!
//! There is at most one live connection per session at any time. The
//! supervisor task dials it, publishes it through [`CurrentConnection`], and
//! waits for somebody to report it as broken. Once that happens, the socket is
//! closed and a new connection is dialed.
//!
//! Reports are bound to a specific [`Connection`], so reporting a connection
//! that has already been replaced has no effect.

use std::{error::Error, io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{
		TcpStream,
		tcp::{OwnedReadHalf, OwnedWriteHalf},
	},
	select,
	sync::{Mutex, watch},
	time,
};
use tokio_util::sync::CancellationToken;

use crate::{event::EventKind, retry::retry_until_cancelled, session::Shared};

/// Identifies a connection within a session
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionId(u64);

/// A live connection to the server
///
/// Cloning is cheap; all clones refer to the same socket.
#[derive(Debug, Clone)]
pub(crate) struct Connection
{
	inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner
{
	id: ConnectionId,
	peer_addr: SocketAddr,

	#[debug(skip)]
	reader: Mutex<OwnedReadHalf>,

	#[debug(skip)]
	writer: Mutex<OwnedWriteHalf>,

	/// cancelled once the connection has been reported broken
	#[debug("{}", broken.is_cancelled())]
	broken: CancellationToken,
}

/// The lifecycle of a session's connection
#[derive(Debug, Clone)]
pub(crate) enum ConnectionState
{
	Disconnected,
	Connecting,
	Connected(Connection),
}

/// The state cell holding a session's current connection
///
/// Only the supervisor publishes new states.
#[derive(Debug)]
pub(crate) struct CurrentConnection
{
	tx: watch::Sender<ConnectionState>,
}

impl Connection
{
	fn new(id: ConnectionId, stream: TcpStream, peer_addr: SocketAddr, broken: CancellationToken) -> Self
	{
		let (reader, writer) = stream.into_split();

		Self {
			inner: Arc::new(ConnectionInner {
				id,
				peer_addr,
				reader: Mutex::new(reader),
				writer: Mutex::new(writer),
				broken,
			}),
		}
	}

	pub(crate) fn id(&self) -> ConnectionId
	{
		self.inner.id
	}

	pub(crate) fn peer_addr(&self) -> SocketAddr
	{
		self.inner.peer_addr
	}

	pub(crate) fn is_broken(&self) -> bool
	{
		self.inner.broken.is_cancelled()
	}

	/// Resolves once this connection has been reported broken (or the session
	/// has been closed).
	pub(crate) async fn broken(&self)
	{
		self.inner.broken.cancelled().await;
	}

	/// Reports this connection as broken so the supervisor replaces it.
	pub(crate) fn report_broken(&self)
	{
		if !self.inner.broken.is_cancelled() {
			debug!(connection.id = %self.id(), "connection reported broken");
			self.inner.broken.cancel();
		}
	}

	/// Reads whatever is available, waiting at most `timeout`.
	///
	/// A timeout is reported as [`io::ErrorKind::TimedOut`], a broken connection
	/// as [`io::ErrorKind::NotConnected`]. `Ok(0)` means the peer closed the
	/// connection.
	pub(crate) async fn read(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>
	{
		let broken = &self.inner.broken;
		let mut reader = select! {
			biased;

			() = broken.cancelled() => return Err(io::ErrorKind::NotConnected.into()),
			reader = self.inner.reader.lock() => reader,
		};

		select! {
			biased;

			() = broken.cancelled() => Err(io::ErrorKind::NotConnected.into()),
			read_result = time::timeout(timeout, reader.read(buf)) => match read_result {
				Ok(read_result) => read_result,
				Err(_) => Err(io::ErrorKind::TimedOut.into()),
			},
		}
	}

	/// Writes a complete frame, waiting at most `timeout` once it is our turn
	/// to write.
	///
	/// If the write fails, times out, or is cancelled midway, the peer may have
	/// received a partial frame, so the connection is reported broken.
	pub(crate) async fn write(&self, frame: &[u8], timeout: Duration) -> io::Result<()>
	{
		let broken = &self.inner.broken;
		let mut writer = select! {
			biased;

			() = broken.cancelled() => return Err(io::ErrorKind::NotConnected.into()),
			writer = self.inner.writer.lock() => writer,
		};

		let break_on_drop = broken.clone().drop_guard();
		let write = async {
			writer.write_all(frame).await?;
			writer.flush().await
		};

		let write_result = select! {
			biased;

			() = broken.cancelled() => Err(io::ErrorKind::NotConnected.into()),
			write_result = time::timeout(timeout, write) => match write_result {
				Ok(write_result) => write_result,
				Err(_) => Err(io::ErrorKind::TimedOut.into()),
			},
		};

		if write_result.is_ok() {
			break_on_drop.disarm();
		}

		write_result
	}

	/// Marks the connection broken and shuts down the socket.
	async fn close(&self)
	{
		self.inner.broken.cancel();

		if let Err(error) = self.inner.writer.lock().await.shutdown().await {
			debug!(connection.id = %self.id(), error = &error as &dyn Error, "failed to shut down socket");
		}
	}
}

impl CurrentConnection
{
	pub(crate) fn new() -> Self
	{
		Self { tx: watch::Sender::new(ConnectionState::Disconnected) }
	}

	fn publish(&self, state: ConnectionState)
	{
		self.tx.send_replace(state);
	}

	/// Returns the current connection if it is still usable.
	pub(crate) fn current(&self) -> Option<Connection>
	{
		match &*self.tx.borrow() {
			ConnectionState::Connected(connection) if !connection.is_broken() => {
				Some(connection.clone())
			},
			ConnectionState::Connected(_)
			| ConnectionState::Connecting
			| ConnectionState::Disconnected => None,
		}
	}

	/// Waits for a usable connection.
	///
	/// Returns [`None`] if `shutdown` is cancelled first.
	pub(crate) async fn get(&self, shutdown: &CancellationToken) -> Option<Connection>
	{
		self.get_where(shutdown, |_| true).await
	}

	/// Waits for a usable connection that satisfies `predicate`.
	///
	/// Returns [`None`] if `shutdown` is cancelled first.
	pub(crate) async fn get_where(
		&self,
		shutdown: &CancellationToken,
		mut predicate: impl FnMut(&Connection) -> bool,
	) -> Option<Connection>
	{
		let mut rx = self.tx.subscribe();

		select! {
			biased;

			() = shutdown.cancelled() => None,
			state = rx.wait_for(|state| match state {
				ConnectionState::Connected(connection) => {
					!connection.is_broken() && predicate(connection)
				},
				ConnectionState::Connecting | ConnectionState::Disconnected => false,
			}) => match state.as_deref() {
				Ok(ConnectionState::Connected(connection)) => Some(connection.clone()),
				Ok(ConnectionState::Connecting | ConnectionState::Disconnected) | Err(_) => None,
			},
		}
	}
}

/// Keeps the session connected until `cancellation_token` is cancelled.
pub(crate) async fn supervise(shared: Arc<Shared>, cancellation_token: CancellationToken)
{
	let mut next_id = 0_u64;

	loop {
		shared.connection.publish(ConnectionState::Connecting);

		let id = ConnectionId(next_id);
		let connection =
			retry_until_cancelled(&cancellation_token, shared.config.retry_interval, |attempt| {
				dial(&shared, id, &cancellation_token, attempt)
			})
			.await;

		let Some(connection) = connection else {
			break;
		};

		next_id += 1;

		info!(connection.id = %id, peer = %connection.peer_addr(), "connected");
		shared.events.emit(EventKind::Connected, Vec::new());
		shared.connection.publish(ConnectionState::Connected(connection.clone()));

		select! {
			biased;

			() = cancellation_token.cancelled() => {
				connection.close().await;
				break;
			},

			() = connection.broken() => {},
		}

		warn!(connection.id = %id, "connection broken; reconnecting");
		connection.close().await;
		shared.events.emit(EventKind::Disconnected, Vec::new());
	}

	shared.connection.publish(ConnectionState::Disconnected);
	debug!("supervisor exiting");
}

async fn dial(
	shared: &Shared,
	id: ConnectionId,
	cancellation_token: &CancellationToken,
	attempt: u64,
) -> Option<Connection>
{
	let timeout = shared.config.dial_timeout;
	let stream = match time::timeout(timeout, TcpStream::connect(&*shared.host)).await {
		Ok(Ok(stream)) => stream,
		Ok(Err(error)) => {
			warn!(attempt, error = &error as &dyn Error, "failed to connect");
			return None;
		},
		Err(_) => {
			warn!(attempt, ?timeout, "timed out connecting");
			return None;
		},
	};

	let peer_addr = match stream.peer_addr() {
		Ok(peer_addr) => peer_addr,
		Err(error) => {
			warn!(attempt, error = &error as &dyn Error, "connection dropped immediately");
			return None;
		},
	};

	if let Err(error) = stream.set_nodelay(true) {
		debug!(error = &error as &dyn Error, "failed to set TCP_NODELAY");
	}

	Some(Connection::new(id, stream, peer_addr, cancellation_token.child_token()))
}
