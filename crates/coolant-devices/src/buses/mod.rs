/*!
 * Built-in buses.
 *
 * Every bus parses the filter vocabulary it understands into [`Criteria`]
 * up front, so a recognized key with an unusable value fails the probe with
 * a malformed filter error before any device is touched. Keys no bus knows
 * about are ignored.
 */
use std::io;
use std::sync::Arc;

use tracing::info;

use crate::error::{DeviceError, Result};
use crate::filter::Filter;
use crate::registry::BusRegistry;
use crate::transport::Sysfs;

pub mod hid;
pub mod smbus;
pub mod usb;

pub use hid::HidBus;
pub use smbus::SmBus;
pub use usb::UsbBus;

/// Identifier of the hidraw bus
pub const HID: &str = "hid";
/// Identifier of the SMBus bus
pub const SMBUS: &str = "smbus";
/// Identifier of the raw USB bus
pub const USB: &str = "usb";

/// Filter criteria in the form the built-in buses consume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    /// Vendor id
    pub vendor: Option<u16>,
    /// Product id
    pub product: Option<u16>,
    /// Release number
    pub release: Option<u16>,
    /// Serial number
    pub serial: Option<String>,
    /// Bus name
    pub bus: Option<String>,
    /// Address, uninterpreted
    pub address: Option<String>,
    /// USB port path
    pub usb_port: Option<String>,
    /// Lowercased description substring
    pub description: Option<String>,
    /// Enabled unsafe features
    pub unsafe_features: Vec<String>,
    /// Legacy Asetek 690LC flag
    pub legacy_690lc: bool,
}

impl Criteria {
    /// Read the well-known keys of `filter`
    pub fn from_filter(filter: &Filter) -> Result<Self> {
        Ok(Self {
            vendor: filter.vendor()?,
            product: filter.product()?,
            release: filter.release()?,
            serial: filter.serial()?,
            bus: filter.bus()?,
            address: filter.address()?,
            usb_port: filter.usb_port()?,
            description: filter.description_match()?,
            unsafe_features: filter.unsafe_features()?,
            legacy_690lc: filter.legacy_690lc()?,
        })
    }

    /// Whether `description` contains the requested substring
    pub fn matches_description(&self, description: &str) -> bool {
        match &self.description {
            Some(wanted) => description.to_lowercase().contains(wanted),
            None => true,
        }
    }

    /// Whether the bus criterion, if any, names a bus of this kind
    ///
    /// Lets a bus skip itself before touching its transport.
    pub fn wants_bus(&self, accepts: impl Fn(&str) -> bool) -> bool {
        self.bus.as_deref().map_or(true, accepts)
    }

    /// Whether an optional criterion accepts `actual`
    pub(crate) fn accepts<T: PartialEq>(wanted: &Option<T>, actual: Option<&T>) -> bool {
        match wanted {
            Some(wanted) => actual == Some(wanted),
            None => true,
        }
    }
}

/// Transport error for a bus whose enumeration root cannot be read
pub(crate) fn unavailable(bus: &str, what: &str, err: io::Error) -> DeviceError {
    let message = match err.kind() {
        io::ErrorKind::NotFound => format!("{} not found, is the kernel driver loaded?", what),
        io::ErrorKind::PermissionDenied => format!("permission denied reading {}", what),
        _ => format!("cannot read {}", what),
    };
    DeviceError::transport(bus, message, err)
}

/// Register the built-in buses in `registry`, skipping any already present
pub fn register_builtin(registry: &BusRegistry, sysfs: Sysfs) -> Result<()> {
    let sysfs = Arc::new(sysfs);

    let transport = sysfs.clone();
    registry.register_once(HID, "USB HID devices through hidraw", move || {
        Box::new(HidBus::new(transport.clone()))
    })?;

    let transport = sysfs.clone();
    registry.register_once(SMBUS, "SMBus/I2C devices through i2c-dev", move || {
        Box::new(SmBus::new(transport.clone()))
    })?;

    let transport = sysfs;
    registry.register_once(USB, "USB devices through usbfs", move || {
        Box::new(UsbBus::new(transport.clone()))
    })?;

    info!("Built-in buses registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;

    #[test]
    fn test_criteria_from_filter() {
        let criteria = Criteria::from_filter(
            &Filter::new()
                .with(filter::VENDOR, 0x1e71)
                .with(filter::MATCH, "Kraken")
                .with(filter::UNSAFE, "smbus")
                .with("speed", 50),
        )
        .unwrap();

        assert_eq!(criteria.vendor, Some(0x1e71));
        assert_eq!(criteria.description.as_deref(), Some("kraken"));
        assert_eq!(criteria.unsafe_features, vec!["smbus"]);
        assert!(!criteria.legacy_690lc);
        assert!(criteria.matches_description("NZXT Kraken X (X53, X63 or X73)"));
        assert!(!criteria.matches_description("NZXT Smart Device V2"));
    }

    #[test]
    fn test_criteria_rejects_malformed_values() {
        let err = Criteria::from_filter(&Filter::new().with(filter::RELEASE, "v1")).unwrap_err();
        assert!(matches!(err, DeviceError::MalformedFilter(_)));
    }

    #[test]
    fn test_wants_bus() {
        let any = Criteria::default();
        assert!(any.wants_bus(|bus| bus == HID));

        let usb = Criteria {
            bus: Some("usb3".to_string()),
            ..Criteria::default()
        };
        assert!(usb.wants_bus(|bus| bus.starts_with(USB)));
        assert!(!usb.wants_bus(|bus| bus == HID));
    }

    #[test]
    fn test_accepts() {
        assert!(Criteria::accepts::<u16>(&None, None));
        assert!(Criteria::accepts(&Some(3u16), Some(&3)));
        assert!(!Criteria::accepts(&Some(3u16), None));
        assert!(!Criteria::accepts(&Some(3u16), Some(&4)));
    }

    #[test]
    fn test_register_builtin_is_idempotent() {
        let registry = BusRegistry::new();
        register_builtin(&registry, Sysfs::default()).unwrap();
        register_builtin(&registry, Sysfs::default()).unwrap();

        let names: Vec<String> = registry
            .all_known()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec![HID, SMBUS, USB]);
    }

    #[test]
    fn test_unavailable_messages() {
        let err = unavailable(HID, "/sys/class/hidraw", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_transport());
        assert!(err.to_string().contains("kernel driver"));

        let err = unavailable(USB, "/sys/bus/usb", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().contains("permission denied"));
    }
}
