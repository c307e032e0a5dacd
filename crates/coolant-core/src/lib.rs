/*!
 * coolant core
 *
 * Configuration, logging, error and value types shared by the coolant
 * device and command line crates.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use serde;
    pub use tracing;
}

/// coolant core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("coolant core {} initialized", VERSION);
    Ok(())
}
