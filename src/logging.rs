use crate::{Error, Result};
use tracing::Level;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset: this crate at `level`, everything
/// else at `warn`.
fn default_directive(level: Level) -> String {
    format!("{}={},warn", env!("CARGO_CRATE_NAME"), level)
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
///
/// Worker events carry the pool thread (`join-search-N`) so interleaved
/// partitions can be told apart. A subscriber that is already installed is
/// left in place.
pub fn init_logging(level: Level, json_output: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    if json_output {
        // One flat object per event, so `part_id` sits next to `message`.
        let fmt_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_timer(SystemTime)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true);

        let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
    } else {
        let fmt_layer = fmt::layer()
            .compact()
            .with_timer(SystemTime)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true);

        let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
    }
}

/// Parse a level name such as `info` or `DEBUG`.
pub fn parse_level(name: &str) -> Result<Level> {
    name.parse::<Level>()
        .map_err(|_| Error::Config(format!("unknown log level '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("TRACE").unwrap(), Level::TRACE);
        assert!(matches!(parse_level("loud"), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(Level::DEBUG), "lightning_join=DEBUG,warn");
        assert!(EnvFilter::try_new(default_directive(Level::TRACE)).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(Level::WARN, false);
        init_logging(Level::DEBUG, true);
    }
}
