//! CLI argument handling.

use std::path::Path;

pub(crate) fn args() -> Args
{
	<Args as clap::Parser>::parse()
}

/// A command line client for Frostbite RCON servers.
///
/// The connection is kept alive for as long as the command runs; if it drops,
/// `frcon` reconnects and logs in again on its own.
#[derive(Debug, clap::Parser)]
pub(crate) struct Args
{
	/// Path to the configuration file.
	///
	/// If omitted, `./frcon.toml` is used if it exists.
	#[arg(long = "config", value_name = "FILE")]
	pub(crate) config_path: Option<Box<Path>>,

	/// Use a custom `.env` file.
	#[arg(long, value_name = "FILE")]
	pub(crate) env_file: Option<Box<Path>>,

	/// The game server's RCON address. [env: FRCON_HOST]
	#[arg(long)]
	pub(crate) host: Option<String>,

	/// The RCON password. [env: FRCON_PASSWORD]
	#[arg(long)]
	pub(crate) password: Option<String>,

	#[command(subcommand)]
	pub(crate) command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command
{
	/// Log every event the server sends until interrupted.
	Watch,

	/// Send a single command and print the response, one word per line.
	///
	/// Exits with a non-zero status if the server does not answer with `OK`.
	Exec
	{
		#[arg(required = true, value_name = "WORD")]
		words: Vec<String>,
	},
}
