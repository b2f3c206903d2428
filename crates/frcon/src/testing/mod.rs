//! Utilities for unit & integration tests.

use std::{
	future::Future,
	net::SocketAddr,
	sync::{Arc, Mutex, PoisonError},
	time::Duration,
};

use anyhow::Context;
use bytes::Bytes;
use md5::{Digest, Md5};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	select,
	sync::mpsc,
	task::JoinHandle,
	time,
};

use crate::{
	SessionConfig,
	wire::{self, Flags, FrameAssembler, MAX_FRAME_SIZE},
	word::{Word, words},
};

mod macros;

pub(crate) use macros::*;

pub type Error = anyhow::Error;
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// The challenge every connection to a [`GameServer`] hands out.
const CHALLENGE: &str = "A1B2C3D4";

/// How long tests wait for something to happen before giving up.
pub(crate) const PATIENCE: Duration = Duration::from_secs(5);

/// A [`SessionConfig`] with timeouts short enough for tests.
pub(crate) fn config() -> SessionConfig
{
	SessionConfig::default()
		.with_retry_interval(Duration::from_millis(50))
		.with_dial_timeout(Duration::from_secs(1))
		.with_read_timeout(Duration::from_millis(100))
		.with_write_timeout(Duration::from_secs(1))
		.with_request_timeout(Duration::from_secs(2))
}

/// Awaits `future`, failing the test if it takes longer than [`PATIENCE`].
pub(crate) async fn within<F>(future: F) -> Result<F::Output>
where
	F: Future,
{
	time::timeout(PATIENCE, future).await.context("timed out")
}

/// How a [`GameServer`] answers a request
#[derive(Debug)]
pub(crate) enum Reply
{
	Words(Vec<Word>),
	Ignore,
	After(Duration, Vec<Word>),
}

/// Something a [`GameServer`] saw a client do
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Observed
{
	Connected,
	LoggedIn,
	EventsEnabled,
	Request(Vec<Word>),
	Ack
	{
		sequence: u32,
		words: Vec<Word>,
	},
}

#[derive(Debug)]
enum Control
{
	Push
	{
		sequence: u32,
		words: Vec<Word>,
	},
	Disconnect,
	Garbage(Bytes),
}

type Responder = Arc<dyn Fn(&[Word]) -> Reply + Send + Sync>;

/// A scripted game server
///
/// It handles the login handshake on its own, checking against a fixed
/// password, and answers every other request using a responder function.
#[derive(Debug)]
pub(crate) struct GameServer
{
	addr: SocketAddr,
	observed: mpsc::UnboundedReceiver<Observed>,

	#[debug(skip)]
	current: Arc<Mutex<Option<mpsc::UnboundedSender<Control>>>>,

	#[debug(skip)]
	accept_task: JoinHandle<()>,
}

impl GameServer
{
	pub(crate) async fn start(
		password: &str,
		responder: impl Fn(&[Word]) -> Reply + Send + Sync + 'static,
	) -> Result<Self>
	{
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let (observed_tx, observed) = mpsc::unbounded_channel();
		let current = Arc::new(Mutex::new(None));
		let responder: Responder = Arc::new(responder);
		let password_hash = hash(CHALLENGE, password);
		let accept_task = tokio::spawn({
			let current = Arc::clone(&current);

			async move {
				while let Ok((stream, _)) = listener.accept().await {
					let (control_tx, control_rx) = mpsc::unbounded_channel();

					*current.lock().unwrap_or_else(PoisonError::into_inner) = Some(control_tx);

					let _ = observed_tx.send(Observed::Connected);

					tokio::spawn(serve_connection(
						stream,
						control_rx,
						observed_tx.clone(),
						Arc::clone(&responder),
						password_hash.clone(),
					));
				}
			}
		});

		Ok(Self { addr, observed, current, accept_task })
	}

	pub(crate) fn addr(&self) -> String
	{
		self.addr.to_string()
	}

	/// Waits for the next thing the server observes.
	pub(crate) async fn next_observed(&mut self) -> Result<Observed>
	{
		within(self.observed.recv()).await?.context("game server stopped")
	}

	/// Waits until the server observes something matching `predicate`,
	/// discarding everything before it.
	pub(crate) async fn wait_for(&mut self, predicate: impl Fn(&Observed) -> bool) -> Result<Observed>
	{
		loop {
			let observed = self.next_observed().await?;

			if predicate(&observed) {
				return Ok(observed);
			}
		}
	}

	/// Sends an unsolicited message to the connected client.
	pub(crate) fn push(&self, sequence: u32, words: Vec<Word>) -> Result
	{
		self.control(Control::Push { sequence, words })
	}

	/// Drops the current connection.
	pub(crate) fn disconnect(&self) -> Result
	{
		self.control(Control::Disconnect)
	}

	/// Writes raw bytes to the current connection.
	pub(crate) fn send_garbage(&self, bytes: impl Into<Bytes>) -> Result
	{
		self.control(Control::Garbage(bytes.into()))
	}

	fn control(&self, control: Control) -> Result
	{
		self.current
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.context("no client connected")?
			.send(control)
			.ok()
			.context("connection already closed")
	}
}

impl Drop for GameServer
{
	fn drop(&mut self)
	{
		self.accept_task.abort();
	}
}

fn hash(challenge: &str, password: &str) -> String
{
	let mut bytes = Vec::new();

	for idx in (0..challenge.len()).step_by(2) {
		bytes.push(u8::from_str_radix(&challenge[idx..idx + 2], 16).unwrap());
	}

	let mut hasher = Md5::default();
	hasher.update(&bytes);
	hasher.update(password.as_bytes());

	hasher.finalize().iter().map(|byte| format!("{byte:02X}")).collect()
}

async fn serve_connection(
	mut stream: TcpStream,
	mut control: mpsc::UnboundedReceiver<Control>,
	observed: mpsc::UnboundedSender<Observed>,
	responder: Responder,
	password_hash: String,
)
{
	let (outbound_tx, mut outbound) = mpsc::unbounded_channel::<Bytes>();
	let mut assembler = FrameAssembler::new();
	let mut buf = vec![0_u8; MAX_FRAME_SIZE];

	loop {
		select! {
			read = stream.read(&mut buf) => {
				let n = match read {
					Ok(0) | Err(_) => return,
					Ok(n) => n,
				};

				assembler.extend(&buf[..n]);

				while let Ok(Some(frame)) = assembler.next_frame() {
					let sequence = frame.header.sequence().get();

					if frame.header.is_response() {
						let _ = observed.send(Observed::Ack { sequence, words: frame.words });
						continue;
					}

					let reply = match frame.words.as_slice() {
						[command] if *command == "login.hashed" => {
							Reply::Words(words(["OK", CHALLENGE]))
						},
						[command, hash] if *command == "login.hashed" => {
							if *hash == *password_hash {
								let _ = observed.send(Observed::LoggedIn);
								Reply::Words(vec![Word::OK])
							} else {
								Reply::Words(words(["InvalidPasswordHash"]))
							}
						},
						[command, enabled] if *command == "admin.eventsEnabled" && *enabled == "true" => {
							let _ = observed.send(Observed::EventsEnabled);
							Reply::Words(vec![Word::OK])
						},
						_ => {
							let _ = observed.send(Observed::Request(frame.words.clone()));
							responder(&frame.words)
						},
					};

					let respond = |words: &[Word]| {
						wire::encode_with_flags(
							sequence,
							Flags { is_client: true, is_response: true },
							words,
						)
						.unwrap()
					};

					match reply {
						Reply::Words(words) => {
							let _ = outbound_tx.send(respond(&words));
						},
						Reply::Ignore => {},
						Reply::After(delay, words) => {
							let frame = respond(&words);
							let outbound_tx = outbound_tx.clone();

							tokio::spawn(async move {
								time::sleep(delay).await;
								let _ = outbound_tx.send(frame);
							});
						},
					}
				}
			},

			Some(frame) = outbound.recv() => {
				if stream.write_all(&frame).await.is_err() {
					return;
				}
			},

			control = control.recv() => match control {
				Some(Control::Push { sequence, words }) => {
					// initiated by the server, so neither flag is set
					let frame = wire::encode_with_flags(sequence, Flags::default(), &words).unwrap();

					if stream.write_all(&frame).await.is_err() {
						return;
					}
				},
				Some(Control::Garbage(bytes)) => {
					if stream.write_all(&bytes).await.is_err() {
						return;
					}
				},
				Some(Control::Disconnect) | None => return,
			},
		}
	}
}
