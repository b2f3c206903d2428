use std::fs;

use color_eyre::eyre::{self, WrapErr};
use tracing_subscriber::{
	EnvFilter,
	Layer,
	filter::LevelFilter,
	fmt::time::UtcTime,
	layer::SubscriberExt,
	util::SubscriberInitExt,
};

use crate::config::TracingConfig;

/// Keeps the logfile writer alive.
///
/// Buffered log lines are flushed when this is dropped.
#[must_use = "logs are lost if the guard is dropped early"]
pub(crate) struct Guard
{
	_files_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` controls what gets logged; without it, everything at `INFO` and
/// above is.
pub(crate) fn init(config: &TracingConfig) -> eyre::Result<Guard>
{
	let stderr_layer = config.stderr.enable.then(|| {
		tracing_subscriber::fmt::layer()
			.pretty()
			.with_ansi(config.stderr.ansi)
			.with_writer(std::io::stderr)
			.with_timer(UtcTime::rfc_3339())
	});

	let (files_layer, files_guard) = config
		.files
		.enable
		.then(|| -> eyre::Result<_> {
			fs::create_dir_all(&*config.files.directory).wrap_err_with(|| {
				format!("failed to create log directory at {:?}", config.files.directory)
			})?;

			let (writer, guard) = tracing_appender::rolling::Builder::default()
				.rotation(tracing_appender::rolling::Rotation::DAILY)
				.filename_prefix("frcon")
				.filename_suffix("log")
				.build(&*config.files.directory)
				.map(tracing_appender::non_blocking)
				.wrap_err("failed to install logfile thread")?;

			let layer = tracing_subscriber::fmt::layer()
				.json()
				.with_file(false)
				.with_line_number(false)
				.with_span_list(true)
				.with_writer(writer)
				.with_timer(UtcTime::rfc_3339());

			Ok((layer, guard))
		})
		.transpose()?
		.unzip();

	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::INFO.into())
		.from_env_lossy();

	tracing_subscriber::registry()
		.with(Layer::and_then(stderr_layer, files_layer).with_filter(filter))
		.try_init()
		.wrap_err("failed to install global subscriber")?;

	Ok(Guard { _files_guard: files_guard })
}
