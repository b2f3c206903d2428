use std::time::Duration;

use anyhow::Context;
use tokio::{task::JoinSet, time};

use crate::{
	Event,
	EventKind,
	EventStream,
	RequestError,
	dial_with_config,
	testing::{self, GameServer, Observed, Reply, assert, assert_eq, assert_matches, within},
	wire::EncodeFrameError,
	word::{Word, words},
};

const PASSWORD: &str = "hunter2";

fn server_info(request: &[Word]) -> Reply
{
	match request {
		[command] if *command == "serverInfo" => Reply::Words(words(["OK", "frcon test server", "0", "64"])),
		_ => Reply::Words(words(["UnknownCommand"])),
	}
}

/// Skips events until one of the given kind arrives.
async fn expect_event(events: &mut EventStream, kind: EventKind) -> testing::Result<Event>
{
	loop {
		let event = within(events.recv()).await?;
		let Some(event) = event else {
			anyhow::bail!("event stream ended while waiting for {}", kind.name());
		};

		if event.kind == kind {
			return Ok(event);
		}
	}
}

/// Waits until the session is logged in and the server has seen the whole
/// handshake.
async fn logged_in(server: &mut GameServer, events: &mut EventStream) -> testing::Result
{
	expect_event(events, EventKind::LoggedIn).await?;
	server.wait_for(|observed| *observed == Observed::EventsEnabled).await?;

	Ok(())
}

async fn next_event_kind(events: &mut EventStream) -> testing::Result<Option<EventKind>>
{
	Ok(within(events.recv()).await?.map(|event| event.kind))
}

#[tokio::test]
async fn requests_wait_for_login() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());
	let response = within(session.request(["serverInfo"])).await??;

	assert_eq!(response, words(["OK", "frcon test server", "0", "64"]));
	assert_eq!(server.next_observed().await?, Observed::Connected);
	assert_eq!(server.next_observed().await?, Observed::LoggedIn);
	assert_eq!(server.next_observed().await?, Observed::EventsEnabled);
	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));
	assert!(session.is_logged_in());

	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::Connected));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::LoggedIn));

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn concurrent_requests_are_matched_out_of_order() -> testing::Result
{
	let server = GameServer::start(PASSWORD, |request: &[Word]| match request {
		[command, payload] if *command == "echo" => {
			let n = payload.to_str().unwrap().parse::<u64>().unwrap();

			// answer later requests first
			Reply::After(Duration::from_millis((16 - n) * 20), vec![Word::OK, payload.clone()])
		},
		_ => Reply::Words(words(["UnknownCommand"])),
	})
	.await?;

	let (session, _events) = dial_with_config(server.addr(), PASSWORD, testing::config());
	let mut requests = JoinSet::new();

	for n in 0_u64..16 {
		let session = session.clone();

		requests.spawn(async move {
			let response = session.request(vec![Word::from_static("echo"), Word::from(n.to_string())]).await;
			(n, response)
		});
	}

	let responses = within(requests.join_all()).await?;

	assert_eq!(responses.len(), 16);

	for (n, response) in responses {
		assert_eq!(response?, vec![Word::OK, Word::from(n.to_string())]);
	}

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn pushes_are_emitted_and_acknowledged() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	logged_in(&mut server, &mut events).await?;
	server.push(1337, words(["player.onJoin", "AlphaKeks", "76561198282622073"]))?;

	let event = expect_event(&mut events, EventKind::Words).await?;

	assert_eq!(event.words, words(["player.onJoin", "AlphaKeks", "76561198282622073"]));
	assert_eq!(server.next_observed().await?, Observed::Ack { sequence: 1337, words: vec![Word::OK] });

	// nothing else was sent in between
	within(session.request(["serverInfo"])).await??;

	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn reconnects_and_logs_in_again_after_disconnect() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	logged_in(&mut server, &mut events).await?;
	server.disconnect()?;

	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::BadRead));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::Disconnected));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::Connected));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::LoggedIn));

	assert_eq!(server.next_observed().await?, Observed::Connected);
	assert_eq!(server.next_observed().await?, Observed::LoggedIn);
	assert_eq!(server.next_observed().await?, Observed::EventsEnabled);

	within(session.request(["serverInfo"])).await??;

	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn requests_after_a_reconnect_wait_for_the_new_login() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	logged_in(&mut server, &mut events).await?;
	server.disconnect()?;
	expect_event(&mut events, EventKind::Disconnected).await?;

	let request = tokio::spawn({
		let session = session.clone();
		async move { session.request(["serverInfo"]).await }
	});

	assert_eq!(server.next_observed().await?, Observed::Connected);
	assert_eq!(server.next_observed().await?, Observed::LoggedIn);
	assert_eq!(server.next_observed().await?, Observed::EventsEnabled);
	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));

	within(request).await???;

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn reports_against_replaced_connections_are_ignored() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	logged_in(&mut server, &mut events).await?;

	let first = session.current_connection().context("no connection after login")?;

	server.disconnect()?;
	expect_event(&mut events, EventKind::Disconnected).await?;
	logged_in(&mut server, &mut events).await?;

	let second = session.current_connection().context("no connection after reconnect")?;

	assert!(first.id() != second.id());

	first.report_broken();

	// the replacement stays up
	assert!(!second.is_broken());
	assert_matches!(time::timeout(Duration::from_millis(300), events.recv()).await, Err(_));
	assert_eq!(session.current_connection().map(|connection| connection.id()), Some(second.id()));

	within(session.request(["serverInfo"])).await??;

	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn malformed_frames_cause_a_reconnect() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	logged_in(&mut server, &mut events).await?;

	// a header declaring a 64 KiB frame
	server.send_garbage(&[0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0][..])?;

	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::BadRead));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::Disconnected));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::Connected));
	assert_eq!(next_event_kind(&mut events).await?, Some(EventKind::LoggedIn));

	within(session.request(["serverInfo"])).await??;

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn unanswered_requests_time_out_without_leaking() -> testing::Result
{
	let server = GameServer::start(PASSWORD, |_: &[Word]| Reply::Ignore).await?;
	let timeout = Duration::from_millis(300);
	let config = testing::config().with_request_timeout(timeout);
	let (session, _events) = dial_with_config(server.addr(), PASSWORD, config);

	let result = within(session.request(["serverInfo"])).await?;

	assert_matches!(result, Err(RequestError::Timeout { timeout: t }) if *t == timeout);
	assert_eq!(session.pending_requests(), 0);

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn close_unblocks_pending_requests() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, |_: &[Word]| Reply::Ignore).await?;
	let config = testing::config().with_request_timeout(Duration::from_secs(60));
	let (session, mut events) = dial_with_config(server.addr(), PASSWORD, config);
	let mut requests = JoinSet::new();

	for _ in 0..8 {
		let session = session.clone();
		requests.spawn(async move { session.request(["serverInfo"]).await });
	}

	for _ in 0..8 {
		server.wait_for(|observed| matches!(observed, Observed::Request(_))).await?;
	}

	session.close();

	for result in within(requests.join_all()).await? {
		assert_matches!(result, Err(RequestError::Done));
	}

	assert!(session.is_closed());
	assert_eq!(session.pending_requests(), 0);
	assert_matches!(session.request(["serverInfo"]).await, Err(RequestError::Done));

	// the stream drains what is left and then ends
	while within(events.recv()).await?.is_some() {}

	within(session.shutdown()).await?;

	Ok(())
}

#[tokio::test]
async fn wrong_passwords_are_reported() -> testing::Result
{
	let server = GameServer::start(PASSWORD, server_info).await?;
	let config = testing::config()
		.with_request_timeout(Duration::from_millis(300))
		.with_login_retry_delay(Duration::from_millis(100));

	let (session, mut events) = dial_with_config(server.addr(), "hunter3", config);

	expect_event(&mut events, EventKind::BadPassword).await?;

	let result = within(session.request(["serverInfo"])).await?;

	assert_matches!(result, Err(RequestError::Timeout { .. }));
	assert!(!session.is_logged_in());

	// public requests do not care
	let response = within(session.request_public(["serverInfo"])).await??;

	assert_eq!(response.first(), Some(&Word::OK));

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn encoding_errors_are_returned_immediately() -> testing::Result
{
	let server = GameServer::start(PASSWORD, server_info).await?;
	let (session, _events) = dial_with_config(server.addr(), PASSWORD, testing::config());

	let result = session.request(Vec::<Word>::new()).await;

	assert_matches!(result, Err(RequestError::Encode(EncodeFrameError::NoWords)));

	let result = session.request_public([Word::from(vec![b'x'; 0x4000])]).await;

	assert_matches!(
		result,
		Err(RequestError::Encode(EncodeFrameError::PayloadTooLong { .. })),
	);

	session.shutdown().await;

	Ok(())
}

#[tokio::test]
async fn events_can_be_disabled() -> testing::Result
{
	let mut server = GameServer::start(PASSWORD, server_info).await?;
	let config = testing::config().with_events_enabled(false);
	let (session, _events) = dial_with_config(server.addr(), PASSWORD, config);

	within(session.request(["serverInfo"])).await??;

	assert_eq!(server.next_observed().await?, Observed::Connected);
	assert_eq!(server.next_observed().await?, Observed::LoggedIn);
	assert_eq!(server.next_observed().await?, Observed::Request(words(["serverInfo"])));

	session.shutdown().await;

	Ok(())
}
