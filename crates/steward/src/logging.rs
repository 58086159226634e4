//! Tracing subscriber setup

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use certsteward_config::{LogConfig, LogFormat};

/// Filter directive for the configured level; `verbose` forces debug
pub fn filter_directive(config: &LogConfig, verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        config.level.as_filter()
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init(config: &LogConfig, verbose: bool) -> Result<()> {
    let directive = filter_directive(config, verbose);
    let env_filter = if verbose {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let json_layer = (config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
    });
    let text_layer = (config.format == LogFormat::Logfmt).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("Failed to initialize logging")
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsteward_config::LogLevel;

    #[test]
    fn test_filter_directive() {
        let config = LogConfig {
            format: LogFormat::Json,
            level: LogLevel::Fatal,
        };
        assert_eq!(filter_directive(&config, false), "error");
        assert_eq!(filter_directive(&config, true), "debug");
    }
}
