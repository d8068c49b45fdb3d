// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use iotgw_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dependencies held at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 4] = ["hyper=warn", "tower_http=warn", "opcua=warn", "async_snmp=warn"];

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the global subscriber.
///
/// `RUST_LOG`, when set, replaces the configured level entirely. A second
/// call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = build_filter(config.level.as_str());

    let _ = match config.format {
        LogFormat::Text => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_ansi(is_terminal))
                .try_init()
        }
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).with_ansi(false))
            .try_init(),
    };
}

/// Filter for `level`, unless `RUST_LOG` is set.
fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new(level), |filter, directive| {
            filter.add_directive(directive)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotgw_config::LogLevel;

    #[test]
    fn test_build_filter_includes_quiet_targets() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let rendered = build_filter("debug").to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("hyper=warn"));
        assert!(rendered.contains("opcua=warn"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
        };
        init_logging(&config);
        init_logging(&config);
    }
}
