//! Structured logging initialization via `tracing`.
//!
//! The tracing output doubles as the progress/status stream of the
//! `backup` and `restore` commands.

use tracing_subscriber::EnvFilter;

/// Output format of the status stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Parse `"human"` or `"json"`; anything else falls back to human.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Initialize the tracing subscriber with sensible defaults.
///
/// Respects the `RUST_LOG` environment variable for filtering.
pub fn init_tracing() {
    init_tracing_with("info", LogFormat::Human);
}

/// Initialize the tracing subscriber with an explicit fallback level.
///
/// `RUST_LOG` still wins when set. Calling this twice is harmless: the
/// second installation attempt is ignored.
pub fn init_tracing_with(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_format() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("human"), LogFormat::Human);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Human);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing();
        init_tracing_with("debug", LogFormat::Json);
    }
}
