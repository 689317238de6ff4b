//! Logging initialization and configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter directives for the service.
///
/// The delivery workers poll the queue every few hundred milliseconds, so
/// sqlx statement logging below warn drowns every other signal. Vendor
/// calls go through reqwest/hyper, whose connection churn is equally
/// uninteresting at debug. `RUST_LOG` still overrides everything.
fn default_filter(level: &str) -> String {
    format!(
        "{},sqlx::query=warn,hyper=warn,reqwest=warn",
        level
    )
}

/// Initializes the logging subsystem based on configuration.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true);
            subscriber.with(json_layer).init();
        }
        "compact" => {
            let compact_layer = fmt::layer().compact().with_target(false);
            subscriber.with(compact_layer).init();
        }
        _ => {
            let pretty_layer = fmt::layer().pretty().with_target(true);
            subscriber.with(pretty_layer).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_keeps_configured_level() {
        assert!(default_filter("info").starts_with("info,"));
        assert!(default_filter("debug").starts_with("debug,"));
    }

    #[test]
    fn test_default_filter_quiets_statement_logging() {
        let filter = default_filter("debug");
        assert!(filter.contains("sqlx::query=warn"));
        assert!(filter.contains("hyper=warn"));
    }
}
