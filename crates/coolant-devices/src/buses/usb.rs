/*!
 * Raw USB bus, for devices driven through usbfs rather than hidraw.
 */
use std::sync::Arc;

use tracing::{debug, trace};

use super::{unavailable, Criteria, USB};
use crate::bus::{Bus, DeviceStream};
use crate::driver::{Driver, DriverInfo};
use crate::drivers::{catalog, FamilyDriver, UsbFamily};
use crate::error::{DeviceError, Result};
use crate::filter::Filter;
use crate::transport::{DeviceHandle, UsbDeviceInfo, UsbTransport};

/// usbfs bus
#[derive(Debug)]
pub struct UsbBus {
    transport: Arc<dyn UsbTransport>,
    families: &'static [&'static UsbFamily],
}

impl UsbBus {
    /// Create a bus probing the built-in USB families
    pub fn new(transport: Arc<dyn UsbTransport>) -> Self {
        Self::with_families(transport, catalog::USB_FAMILIES)
    }

    /// Create a bus probing only `families`
    pub fn with_families(
        transport: Arc<dyn UsbTransport>,
        families: &'static [&'static UsbFamily],
    ) -> Self {
        Self { transport, families }
    }
}

impl Bus for UsbBus {
    fn name(&self) -> &'static str {
        USB
    }

    fn find_devices(self: Box<Self>, filter: Filter) -> Result<DeviceStream> {
        let criteria = Criteria::from_filter(&filter)?;

        if !criteria.wants_bus(|bus| bus.starts_with(USB)) {
            debug!("Skipping usb bus, filter asks for bus {:?}", criteria.bus);
            return Ok(Box::new(std::iter::empty()));
        }

        let devices = self
            .transport
            .usb_devices()
            .map_err(|e| unavailable(USB, "USB devices", e))?;
        let families = self.families;

        Ok(Box::new(devices.flat_map(move |device| match device {
            Ok(info) => probe(&info, families, &criteria),
            Err(e) => vec![Err(DeviceError::transport(USB, "failed to read USB device", e))],
        })))
    }
}

fn probe(
    info: &UsbDeviceInfo,
    families: &[&UsbFamily],
    criteria: &Criteria,
) -> Vec<Result<Box<dyn Driver>>> {
    let bus = info.bus();
    let address = info.address();
    if !Criteria::accepts(&criteria.bus, Some(&bus))
        || !Criteria::accepts(&criteria.address, Some(&address))
        || !Criteria::accepts(&criteria.usb_port, info.port.as_ref())
    {
        return Vec::new();
    }

    trace!(
        "Found USB device {:04x}:{:04x} on {} at {}",
        info.vendor_id,
        info.product_id,
        bus,
        address
    );

    families
        .iter()
        .filter(|family| family.is_selected(criteria.legacy_690lc))
        .flat_map(|family| family.devices.iter().map(move |supported| (family, supported)))
        .filter(|(_, supported)| {
            (supported.vendor_id, supported.product_id) == (info.vendor_id, info.product_id)
                && Criteria::accepts(&criteria.vendor, Some(&supported.vendor_id))
                && Criteria::accepts(&criteria.product, Some(&supported.product_id))
                && Criteria::accepts(&criteria.release, info.release_number.as_ref())
                && Criteria::accepts(&criteria.serial, info.serial_number.as_ref())
                && criteria.matches_description(supported.description)
        })
        .map(|(family, supported)| {
            debug!("Instantiating {} driver for {}", family.name, supported.description);
            let driver = FamilyDriver::new(
                DriverInfo {
                    description: supported.description.to_string(),
                    driver: family.name.to_string(),
                    vendor_id: info.vendor_id,
                    product_id: info.product_id,
                    release_number: info.release_number,
                    serial_number: info.serial_number.clone(),
                    bus: bus.clone(),
                    address: address.clone(),
                    port: info.port.clone(),
                    capabilities: family.capabilities.to_vec(),
                },
                DeviceHandle::new(&info.path),
            );
            Ok(Box::new(driver) as Box<dyn Driver>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    use crate::filter;
    use crate::transport::Enumeration;

    #[derive(Debug)]
    struct FixedUsb(Vec<UsbDeviceInfo>);

    impl UsbTransport for FixedUsb {
        fn usb_devices(&self) -> io::Result<Enumeration<UsbDeviceInfo>> {
            Ok(Box::new(self.0.clone().into_iter().map(Ok)))
        }
    }

    #[derive(Debug)]
    struct MissingUsb;

    impl UsbTransport for MissingUsb {
        fn usb_devices(&self) -> io::Result<Enumeration<UsbDeviceInfo>> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn device(bus_number: u16, device_number: u16, product_id: u16, port: &str) -> UsbDeviceInfo {
        UsbDeviceInfo {
            path: PathBuf::from(format!("/dev/bus/usb/{:03}/{:03}", bus_number, device_number)),
            vendor_id: 0x2433,
            product_id,
            release_number: Some(0x0100),
            serial_number: None,
            product: None,
            bus_number,
            device_number,
            port: Some(port.to_string()),
        }
    }

    fn bus() -> Box<UsbBus> {
        Box::new(UsbBus::new(Arc::new(FixedUsb(vec![
            device(1, 2, 0xb111, "1"),
            device(1, 4, 0xb200, "2"),
            device(3, 7, 0xb200, "1.4"),
        ]))))
    }

    fn addresses(stream: DeviceStream) -> Vec<(String, String)> {
        stream
            .map(|d| {
                let d = d.unwrap();
                (d.info().bus.clone(), d.info().address.clone())
            })
            .collect()
    }

    #[test]
    fn test_finds_asetek_coolers() {
        let found = addresses(bus().find_devices(Filter::new()).unwrap());
        assert_eq!(
            found,
            vec![
                ("usb1".to_string(), "4".to_string()),
                ("usb3".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn test_bus_and_port_filters() {
        let found = addresses(
            bus()
                .find_devices(Filter::new().with(filter::BUS, "usb3"))
                .unwrap(),
        );
        assert_eq!(found, vec![("usb3".to_string(), "7".to_string())]);

        let found = addresses(
            bus()
                .find_devices(Filter::new().with(filter::USB_PORT, "2"))
                .unwrap(),
        );
        assert_eq!(found, vec![("usb1".to_string(), "4".to_string())]);
    }

    #[test]
    fn test_driver_info() {
        let driver = bus().find_devices(Filter::new()).unwrap().next().unwrap().unwrap();
        assert_eq!(driver.info().driver, "asetek");
        assert_eq!(driver.info().port.as_deref(), Some("2"));
        assert_eq!(driver.vendor_id(), 0x2433);
    }

    #[test]
    fn test_legacy_flag_selects_legacy_driver() {
        let drivers: Vec<String> = bus()
            .find_devices(Filter::new().with(filter::LEGACY_690LC, true))
            .unwrap()
            .map(|d| d.unwrap().info().driver.clone())
            .collect();
        assert_eq!(drivers, vec!["asetek_legacy", "asetek_legacy"]);
    }

    #[test]
    fn test_corsair_hydro() {
        let mut hydro = device(2, 3, 0x0c09, "3");
        hydro.vendor_id = 0x1b1c;
        let driver = Box::new(UsbBus::new(Arc::new(FixedUsb(vec![hydro]))))
            .find_devices(Filter::new())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(driver.info().driver, "asetek_hydro");
        assert_eq!(driver.description(), "Corsair Hydro H100i v2");
    }

    #[test]
    fn test_other_bus_requested_skips_transport() {
        let found = Box::new(UsbBus::new(Arc::new(MissingUsb)))
            .find_devices(Filter::new().with(filter::BUS, "hid"))
            .unwrap()
            .count();
        assert_eq!(found, 0);
    }

    #[test]
    fn test_missing_usbfs_is_a_transport_error() {
        let err = Box::new(UsbBus::new(Arc::new(MissingUsb)))
            .find_devices(Filter::new())
            .err()
            .unwrap();
        assert!(err.is_transport());
        assert_eq!(err.bus(), Some(USB));
    }
}
