/*!
 * Device drivers.
 *
 * Each driver family is described by a static table of the devices it
 * supports. Buses match transport-level devices against these tables and
 * wrap every match in a [`FamilyDriver`], which owns the device handle.
 * Family-specific control protocols are layered on top of `FamilyDriver` and
 * are not part of discovery.
 */
use tracing::debug;

use crate::driver::{Driver, DriverCapability, DriverInfo};
use crate::error::Result;
use crate::transport::DeviceHandle;

pub mod catalog;

/// A USB or HID device supported by a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedDevice {
    /// Vendor id
    pub vendor_id: u16,
    /// Product id
    pub product_id: u16,
    /// Human-readable description
    pub description: &'static str,
}

/// A family of USB or HID devices sharing one protocol
#[derive(Debug)]
pub struct UsbFamily {
    /// Driver name
    pub name: &'static str,
    /// Capabilities common to the family
    pub capabilities: &'static [DriverCapability],
    /// Supported devices
    pub devices: &'static [SupportedDevice],
    /// For families sharing ids, whether the `legacy_690lc` filter flag must
    /// be set (`Some(true)`) or unset (`Some(false)`)
    pub legacy_690lc: Option<bool>,
}

impl UsbFamily {
    /// Whether the family applies given the `legacy_690lc` filter flag
    pub fn is_selected(&self, legacy_690lc: bool) -> bool {
        self.legacy_690lc.map_or(true, |wanted| wanted == legacy_690lc)
    }
}

/// A GPU whose lighting controller sits on the card's I²C bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDevice {
    /// PCI vendor of the GPU chip
    pub vendor: u16,
    /// PCI device id of the GPU chip
    pub device: u16,
    /// Board vendor (PCI subsystem vendor)
    pub subsystem_vendor: u16,
    /// Board model (PCI subsystem device)
    pub subsystem_device: u16,
    /// I²C address of the controller
    pub address: u8,
    /// Human-readable description
    pub description: &'static str,
}

/// How an SMBus family recognizes its devices
#[derive(Debug)]
pub enum SmbusMatch {
    /// Controllers on graphics cards, identified by the card's PCI ids
    ///
    /// A card exposes several I²C adapters; the controller only sits on the
    /// one bound to `host_driver` whose name starts with `adapter_prefix`.
    Gpu {
        /// Kernel driver of the graphics card
        host_driver: &'static str,
        /// Name prefix of the adapter carrying the controller
        adapter_prefix: &'static str,
        /// Supported cards
        devices: &'static [GpuDevice],
    },
    /// Controllers on memory modules, identified through the SPD EEPROM
    MemoryModule {
        /// Kernel drivers of SMBus host controllers that may carry DIMMs
        host_drivers: &'static [&'static str],
        /// First SPD EEPROM address; one slot per consecutive address
        spd_base: u8,
        /// First controller address, paired slot by slot with the SPD
        controller_base: u8,
        /// Number of slots
        slots: u8,
        /// JEDEC manufacturer id (bank byte without parity, code byte)
        manufacturer: (u8, u8),
        /// Human-readable description
        description: &'static str,
    },
}

/// A family of SMBus devices sharing one protocol
#[derive(Debug)]
pub struct SmbusFamily {
    /// Driver name
    pub name: &'static str,
    /// Capabilities common to the family
    pub capabilities: &'static [DriverCapability],
    /// Features that must be enabled through the `unsafe` filter key
    pub unsafe_features: &'static [&'static str],
    /// How devices are recognized
    pub matcher: SmbusMatch,
}

impl SmbusFamily {
    /// Whether every required unsafe feature is in `enabled`
    pub fn is_enabled(&self, enabled: &[String]) -> bool {
        self.unsafe_features
            .iter()
            .all(|feature| enabled.iter().any(|e| e == feature))
    }
}

/// Driver instance for a device matched from a family table
#[derive(Debug)]
pub struct FamilyDriver {
    info: DriverInfo,
    handle: DeviceHandle,
}

impl FamilyDriver {
    /// Bind a matched device to its handle
    pub fn new(info: DriverInfo, handle: DeviceHandle) -> Self {
        Self { info, handle }
    }

    /// The transport handle
    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl Driver for FamilyDriver {
    fn info(&self) -> &DriverInfo {
        &self.info
    }

    fn connect(&mut self) -> Result<()> {
        debug!("Connecting to {} at {}", self.info.description, self.handle.path().display());
        self.handle.open()
    }

    fn disconnect(&mut self) -> Result<()> {
        debug!("Disconnecting from {}", self.info.description);
        self.handle.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.is_open()
    }
}
