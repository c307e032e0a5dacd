/*!
 * Coolant Devices
 *
 * Bus and driver discovery for cooling and lighting hardware. Buses are
 * registered in a [`BusRegistry`]; [`find_devices`] walks them in identifier
 * order and lazily yields one [`Driver`] per supported device found.
 */

#![warn(missing_docs)]

pub use coolant_core::prelude;

pub mod bus;
pub mod buses;
pub mod discovery;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod registry;
pub mod transport;

pub use bus::{Bus, DeviceStream};
pub use discovery::{find_devices, Discovery};
pub use driver::{Driver, DriverCapability, DriverInfo};
pub use error::{DeviceError, Result};
pub use filter::Filter;
pub use registry::{register_bus, BusEntry, BusRegistry};
pub use transport::{DeviceHandle, Sysfs};

use coolant_core::config::DiscoveryConfig;

/// Coolant devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Register the built-in buses in the process-wide registry, using `/sys` and `/dev`
pub fn init() -> Result<()> {
    init_with_sysfs(Sysfs::default())
}

/// Register the built-in buses in the process-wide registry, using configured roots
pub fn init_with_config(config: &DiscoveryConfig) -> Result<()> {
    init_with_sysfs(Sysfs::from_config(config))
}

fn init_with_sysfs(sysfs: Sysfs) -> Result<()> {
    buses::register_builtin(registry::global(), sysfs)?;
    tracing::info!("Coolant Devices {} initialized", VERSION);
    Ok(())
}

/// Identifiers and descriptions of the buses in the process-wide registry
pub fn available_buses() -> Result<Vec<(String, String)>> {
    let mut buses: Vec<(String, String)> = registry::global()
        .all_known()?
        .iter()
        .map(|entry| (entry.name().to_string(), entry.description().to_string()))
        .collect();
    buses.sort();
    Ok(buses)
}
