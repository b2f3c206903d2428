pub(crate) mod tracing;

use std::{fs, path::Path};

use color_eyre::{
	Section,
	eyre::{self, WrapErr},
};
use serde::Deserialize;

pub(crate) use self::tracing::TracingConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct Config
{
	pub(crate) tracing: TracingConfig,
	pub(crate) session: frcon::SessionConfig,
}

impl Config
{
	pub(crate) fn load_from_file(path: impl AsRef<Path>) -> eyre::Result<Self>
	{
		let file = fs::read_to_string(path.as_ref())
			.wrap_err_with(|| format!("failed to read configuration file at {:?}", path.as_ref()))
			.suggestion("create the file or run with `--config` to specify an alternative path")?;

		toml::from_str(&file).wrap_err("failed to parse configuration file")
	}
}
