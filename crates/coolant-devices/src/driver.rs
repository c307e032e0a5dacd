/*!
 * Driver trait and core driver abstractions.
 *
 * A driver instance represents one reachable physical device. Buses create
 * drivers while probing; the discovery engine hands each one to the caller
 * and keeps nothing behind.
 */
use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Capability a driver declares for its device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverCapability {
    /// The device reports status (temperatures, speeds, voltages)
    Status,
    /// The device drives fans
    FanControl,
    /// The device drives a pump
    PumpControl,
    /// The device drives RGB lighting
    Lighting,
    /// The device is a power supply
    PowerSupply,
    /// Custom capability
    Custom(String),
}

impl fmt::Display for DriverCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverCapability::Status => write!(f, "status"),
            DriverCapability::FanControl => write!(f, "fan control"),
            DriverCapability::PumpControl => write!(f, "pump control"),
            DriverCapability::Lighting => write!(f, "lighting"),
            DriverCapability::PowerSupply => write!(f, "power supply"),
            DriverCapability::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Driver information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    /// Human-readable description
    pub description: String,
    /// Name of the driver family handling the device
    pub driver: String,
    /// Vendor id
    pub vendor_id: u16,
    /// Product id
    pub product_id: u16,
    /// Release number (bcdDevice), when the transport exposes it
    pub release_number: Option<u16>,
    /// Serial number, when the transport exposes it
    pub serial_number: Option<String>,
    /// Bus name as reported by the transport (`hid`, `usb1`, `i2c-3`)
    pub bus: String,
    /// Address on that bus
    pub address: String,
    /// Physical USB port path, if any
    pub port: Option<String>,
    /// Declared capabilities
    pub capabilities: Vec<DriverCapability>,
}

/// The core driver trait
///
/// Discovery only ever constructs and yields drivers. The connection methods
/// exist for callers; device-specific control lives in the implementations.
pub trait Driver: Send + Debug {
    /// Get the driver information
    fn info(&self) -> &DriverInfo;

    /// Get the human-readable description
    fn description(&self) -> &str {
        &self.info().description
    }

    /// Get the vendor id
    fn vendor_id(&self) -> u16 {
        self.info().vendor_id
    }

    /// Get the product id
    fn product_id(&self) -> u16 {
        self.info().product_id
    }

    /// Get the declared capabilities
    fn capabilities(&self) -> &[DriverCapability] {
        &self.info().capabilities
    }

    /// Check if the driver declares a specific capability
    fn has_capability(&self, capability: &DriverCapability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Open the exclusive transport handle
    fn connect(&mut self) -> Result<()>;

    /// Release the transport handle
    fn disconnect(&mut self) -> Result<()>;

    /// Whether the transport handle is currently open
    fn is_connected(&self) -> bool;
}
