/*!
 * USB HID bus, backed by hidraw.
 */
use std::sync::Arc;

use tracing::debug;

use super::{unavailable, Criteria, HID};
use crate::bus::{Bus, DeviceStream};
use crate::driver::{Driver, DriverInfo};
use crate::drivers::{catalog, FamilyDriver, UsbFamily};
use crate::error::{DeviceError, Result};
use crate::filter::Filter;
use crate::transport::{DeviceHandle, HidDeviceInfo, HidTransport};

/// hidraw bus
#[derive(Debug)]
pub struct HidBus {
    transport: Arc<dyn HidTransport>,
    families: &'static [&'static UsbFamily],
}

impl HidBus {
    /// Create a bus probing the built-in HID families
    pub fn new(transport: Arc<dyn HidTransport>) -> Self {
        Self::with_families(transport, catalog::HID_FAMILIES)
    }

    /// Create a bus probing only `families`
    pub fn with_families(
        transport: Arc<dyn HidTransport>,
        families: &'static [&'static UsbFamily],
    ) -> Self {
        Self { transport, families }
    }
}

impl Bus for HidBus {
    fn name(&self) -> &'static str {
        HID
    }

    fn find_devices(self: Box<Self>, filter: Filter) -> Result<DeviceStream> {
        let criteria = Criteria::from_filter(&filter)?;

        if !criteria.wants_bus(|bus| bus == HID) {
            debug!("Skipping hid bus, filter asks for bus {:?}", criteria.bus);
            return Ok(Box::new(std::iter::empty()));
        }

        let devices = self
            .transport
            .hid_devices()
            .map_err(|e| unavailable(HID, "hidraw devices", e))?;
        let families = self.families;

        Ok(Box::new(devices.flat_map(move |device| match device {
            Ok(info) => probe(&info, families, &criteria),
            Err(e) => vec![Err(DeviceError::transport(HID, "failed to read hidraw device", e))],
        })))
    }
}

fn probe(
    info: &HidDeviceInfo,
    families: &[&UsbFamily],
    criteria: &Criteria,
) -> Vec<Result<Box<dyn Driver>>> {
    let address = info.address();
    if !Criteria::accepts(&criteria.address, Some(&address))
        || !Criteria::accepts(&criteria.usb_port, info.port.as_ref())
    {
        return Vec::new();
    }

    debug!(
        "Found HID device {:04x}:{:04x} at {}",
        info.vendor_id, info.product_id, address
    );

    let mut drivers = Vec::new();
    for family in families.iter().filter(|f| f.is_selected(criteria.legacy_690lc)) {
        for supported in family.devices {
            if (supported.vendor_id, supported.product_id) != (info.vendor_id, info.product_id)
                || !Criteria::accepts(&criteria.vendor, Some(&supported.vendor_id))
                || !Criteria::accepts(&criteria.product, Some(&supported.product_id))
                || !Criteria::accepts(&criteria.release, info.release_number.as_ref())
                || !Criteria::accepts(&criteria.serial, info.serial_number.as_ref())
                || !criteria.matches_description(supported.description)
            {
                continue;
            }

            debug!("Instantiating {} driver for {}", family.name, supported.description);
            let driver = FamilyDriver::new(
                DriverInfo {
                    description: supported.description.to_string(),
                    driver: family.name.to_string(),
                    vendor_id: info.vendor_id,
                    product_id: info.product_id,
                    release_number: info.release_number,
                    serial_number: info.serial_number.clone(),
                    bus: HID.to_string(),
                    address: address.clone(),
                    port: info.port.clone(),
                    capabilities: family.capabilities.to_vec(),
                },
                DeviceHandle::new(&info.path),
            );
            drivers.push(Ok(Box::new(driver) as Box<dyn Driver>));
        }
    }
    drivers
}
