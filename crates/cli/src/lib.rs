pub mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use vmprobe_core::{EngineConfig, Flag, Flagset};

/// Parse a `--flags` value (`all`, `default`, decimal, `0x` hex, or a comma
/// list of technique labels).
pub fn parse_flagset(raw: &str) -> Result<Flagset> {
    raw.parse::<Flagset>().with_context(|| format!("Invalid flagset '{raw}'"))
}

/// Flagset a command runs with: the requested one, plus the cursor bit when
/// `--enable-cursor` was given.
pub fn effective_flags(flags: Option<&str>, enable_cursor: bool) -> Result<Flagset> {
    let base = match flags {
        Some(raw) => parse_flagset(raw)?,
        None => Flagset::DEFAULT,
    };
    Ok(if enable_cursor { base.with(Flag::Cursor) } else { base })
}

/// Load the engine configuration, or the defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Install the stderr logger. `RUST_LOG` wins over the verbosity count.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}
