// frcon - a self-healing RCON client for Frostbite game servers.
//
// Copyright (C) 2024  AlphaKeks <alphakeks@dawn>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see https://www.gnu.org/licenses.


#[macro_use(Display)]
extern crate derive_more as _;

#[macro_use]
extern crate tracing;

use std::{env, fs, process::ExitCode};

use color_eyre::{
	Section,
	eyre::{self, OptionExt, WrapErr},
};

use self::{cli::Command, config::Config};

mod cli;
mod config;
mod exec;
mod panic_hook;
mod signal;
mod telemetry;
mod watch;

const DEFAULT_CONFIG_PATH: &str = "./frcon.toml";

#[tokio::main]
async fn main() -> eyre::Result<ExitCode>
{
	color_eyre::install()?;

	let args = cli::args();

	if let Some(path) = args.env_file.as_deref() {
		dotenvy::from_path(path).wrap_err_with(|| format!("failed to load {path:?}"))?;
	} else {
		match dotenvy::dotenv() {
			Ok(_) => {},
			Err(err) if err.not_found() => {},
			Err(err) => return Err(err).wrap_err("failed to load `.env` file"),
		}
	}

	let config = match args.config_path.as_deref() {
		Some(path) => Config::load_from_file(path)?,
		None if fs::exists(DEFAULT_CONFIG_PATH)? => Config::load_from_file(DEFAULT_CONFIG_PATH)?,
		None => Config::default(),
	};

	let _guard = telemetry::init(&config.tracing).wrap_err("failed to initialize tracing")?;

	panic_hook::install();

	// `.env` files are loaded after parsing, so the environment is consulted here
	let host = args
		.host
		.or_else(|| env::var("FRCON_HOST").ok())
		.ok_or_eyre("no game server address")
		.suggestion("pass `--host` or set `FRCON_HOST`")?;

	let password = args
		.password
		.or_else(|| env::var("FRCON_PASSWORD").ok())
		.ok_or_eyre("no RCON password")
		.suggestion("pass `--password` or set `FRCON_PASSWORD`")?;

	info!(%host, "connecting");

	let (session, events) = frcon::dial_with_config(host, password, config.session);
	let exit_code = match args.command {
		Command::Watch => {
			watch::run(events).await;
			ExitCode::SUCCESS
		},
		Command::Exec { words } => exec::run(&session, events, words).await?,
	};

	session.shutdown().await;

	Ok(exit_code)
}
