//! The `exec` command

use std::{
	io::{self, Write},
	process::ExitCode,
};

use color_eyre::{
	Section,
	eyre::{self, WrapErr},
};
use frcon::{EventStream, Session, Word};
use tokio::select;

use crate::{signal, watch};

/// Sends `words` as a single authenticated request and prints the response.
///
/// The exit code reflects whether the server answered with `OK`.
#[tracing::instrument(skip(session, events))]
pub(crate) async fn run(session: &Session, events: EventStream, words: Vec<String>) -> eyre::Result<ExitCode>
{
	// ends once the session is shut down
	tokio::spawn(watch::log_events(events));

	let response = select! {
		signal = signal::shutdown() => {
			warn!(%signal, "interrupted before the server answered");
			return Ok(ExitCode::FAILURE);
		},

		response = session.request(words) => response
			.wrap_err("failed to execute command")
			.suggestion("check that the server is reachable and the password is correct")?,
	};

	print_words(&response).wrap_err("failed to write response")?;

	if response.first().is_some_and(|word| *word == Word::OK) {
		Ok(ExitCode::SUCCESS)
	} else {
		Ok(ExitCode::FAILURE)
	}
}

fn print_words(words: &[Word]) -> io::Result<()>
{
	let mut stdout = io::stdout().lock();

	for word in words {
		writeln!(stdout, "{word}")?;
	}

	stdout.flush()
}
