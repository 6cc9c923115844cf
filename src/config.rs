//! Launcher configuration, read from the environment.
//!
//! The argument vector is forwarded to the target untouched, so the launcher takes no
//! options of its own and is configured through environment variables instead.

use std::env;
use std::ffi::OsString;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};


/// `tracing` filter directive for the launcher's own logs.
pub const LOG_VAR: &str = "TRACEE_LAUNCH_LOG";

/// Make failure to disable ASLR fatal.
pub const STRICT_ASLR_VAR: &str = "TRACEE_LAUNCH_STRICT_ASLR";

/// Default log filter. Logging stays off so the diagnostic stream holds only the
/// `Program:`/`Arg:` lines.
pub const DEFAULT_LOG: &str = "off";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Filter directive passed to the `tracing` subscriber.
    pub log: String,

    /// Abort the launch if `personality(2)` refuses `ADDR_NO_RANDOMIZE`.
    pub strict_aslr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: DEFAULT_LOG.to_owned(),
            strict_aslr: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|var| env::var_os(var))
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(log) = lookup(LOG_VAR) {
            config.log = log
                .into_string()
                .map_err(|value| Error::Config { var: LOG_VAR, value })?;
        }

        if let Some(value) = lookup(STRICT_ASLR_VAR) {
            config.strict_aslr = parse_bool(STRICT_ASLR_VAR, value)?;
        }

        Ok(config)
    }

    /// Install a stderr `fmt` subscriber filtered by `self.log`.
    pub fn init_logging(&self) -> Result<()> {
        let filter = EnvFilter::try_new(&self.log).map_err(|_| Error::Config {
            var: LOG_VAR,
            value: self.log.clone().into(),
        })?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();

        Ok(())
    }
}

fn parse_bool(var: &'static str, value: OsString) -> Result<bool> {
    let parsed = value.to_str().and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    });

    parsed.ok_or(Error::Config { var, value })
}
