/*!
 * Prelude module for coolant core.
 *
 * Re-exports the commonly used types so that downstream crates can pull them
 * in with a single glob import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::{Metadata, Value};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, DiscoveryConfig, LoggingConfig};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
