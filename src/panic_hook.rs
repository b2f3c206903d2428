use std::{
	backtrace::{Backtrace, BacktraceStatus},
	panic::{self, PanicHookInfo},
};

use tracing::field;

/// Logs panics through `tracing` before handing them to the default hook.
///
/// Backtraces are only included if enabled via `RUST_BACKTRACE`.
pub(crate) fn install()
{
	let old_hook = panic::take_hook();

	panic::set_hook(Box::new(move |panic_info| {
		let location = panic_info.location().map(field::display);
		let backtrace = Backtrace::capture();
		let backtrace =
			(backtrace.status() == BacktraceStatus::Captured).then(|| field::display(&backtrace));

		match payload(panic_info) {
			Some(panic_message) => error!(
				target: "frcon::panics",
				location,
				backtrace,
				"thread panicked: {panic_message}",
			),
			None => error!(target: "frcon::panics", location, backtrace, "thread panicked"),
		}

		old_hook(panic_info)
	}));
}

fn payload<'a>(panic_info: &'a PanicHookInfo<'_>) -> Option<&'a str>
{
	let payload = panic_info.payload();

	payload
		.downcast_ref::<&'static str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}
