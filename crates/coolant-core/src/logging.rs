/*!
 * Logging functionality for coolant.
 *
 * Tracing setup shared by the library crates and the command line tool.
 * Logs go to stderr so that device listings on stdout stay machine readable.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_config(&LoggingConfig::default())
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "coolant_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    init_with_config(&LoggingConfig {
        level: filter.to_string(),
        ..LoggingConfig::default()
    })
}

/// Initialize the logging system from a logging configuration
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::logging(format!("Invalid log filter {:?}: {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a component
///
/// # Arguments
///
/// * `name` - The name of the component
/// * `id` - An optional ID for the component instance
pub fn component_span(name: &str, id: Option<&str>) -> Span {
    match id {
        Some(id) => tracing::debug_span!("component", name = %name, id = %id),
        None => tracing::debug_span!("component", name = %name),
    }
}

/// Create a new span for an operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `component` - The component performing the operation
pub fn operation_span(name: &str, component: &str) -> Span {
    tracing::debug_span!("operation", name = %name, component = %component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails() {
        // Only the first global subscriber wins
        let _ = init();
        let second = init_with_filter("debug");
        assert!(matches!(second, Err(Error::Logging(_))));
    }

    #[test]
    fn test_component_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = component_span("hid", Some("hidraw0"));
            assert!(!span.is_disabled());
            assert_eq!(span.metadata().map(|m| m.name()), Some("component"));

            let span = component_span("smbus", None);
            assert!(!span.is_disabled());
        });
    }

    #[test]
    fn test_operation_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = operation_span("find_devices", "discovery");
            assert_eq!(span.metadata().map(|m| m.name()), Some("operation"));
        });
    }
}
