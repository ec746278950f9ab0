//! Logger setup for the binary (flexi_logger behind the `log` facade).

use std::path::Path;

use anyhow::Result;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

/// Crates that are chatty at info level.
const QUIET: &str = "symphonia=warn, notify=warn";

/// Log specification for a configured level; `--debug` wins.
pub fn level_spec(level: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { level.trim() };
    let level = if level.is_empty() { "info" } else { level };
    format!("{level}, {QUIET}")
}

/// Start logging. `RUST_LOG` overrides `spec`. With a directory, logs go to
/// a rotated file there and warnings are copied to stderr; otherwise
/// everything goes to stderr. Keep the handle alive for the whole run.
pub fn init(spec: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str(spec)?;
    let handle = match log_dir {
        Some(dir) => logger
            .log_to_file(
                FileSpec::default()
                    .directory(dir)
                    .basename("fe")
                    .suffix("log")
                    .suppress_timestamp(),
            )
            .rotate(
                Criterion::Size(1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(3),
            )
            .duplicate_to_stderr(Duplicate::Warn)
            .start()?,
        None => logger.log_to_stderr().start()?,
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_level() {
        assert_eq!(level_spec("warn", false), format!("warn, {QUIET}"));
        assert_eq!(level_spec("warn", true), format!("debug, {QUIET}"));
        assert_eq!(level_spec("  ", false), format!("info, {QUIET}"));
    }

    #[test]
    fn spec_parses() {
        assert!(flexi_logger::LogSpecification::parse(level_spec("trace", false)).is_ok());
    }
}
