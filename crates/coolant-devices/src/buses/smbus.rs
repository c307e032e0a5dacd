/*!
 * SMBus/I²C bus.
 *
 * Talking to arbitrary I²C addresses can upset unrelated hardware, so every
 * SMBus family is gated behind unsafe features that the caller must enable
 * through the `unsafe` filter key. With none enabled the bus yields nothing.
 * A system without any I²C adapter is not an error here.
 */
use std::io;
use std::iter;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{unavailable, Criteria, SMBUS};
use crate::bus::{Bus, DeviceStream};
use crate::driver::{Driver, DriverInfo};
use crate::drivers::{catalog, FamilyDriver, GpuDevice, SmbusFamily, SmbusMatch};
use crate::error::{DeviceError, Result};
use crate::filter::{parse_int, Filter};
use crate::transport::{DeviceHandle, I2cAdapterInfo, SmbusTransport};

/// Offsets of the module manufacturer id in a DDR4 SPD
const SPD_MANUFACTURER_BANK: usize = 320;
const SPD_MANUFACTURER_CODE: usize = 321;

/// i2c-dev bus
#[derive(Debug)]
pub struct SmBus {
    transport: Arc<dyn SmbusTransport>,
    families: &'static [&'static SmbusFamily],
}

impl SmBus {
    /// Create a bus probing the built-in SMBus families
    pub fn new(transport: Arc<dyn SmbusTransport>) -> Self {
        Self::with_families(transport, catalog::SMBUS_FAMILIES)
    }

    /// Create a bus probing only `families`
    pub fn with_families(
        transport: Arc<dyn SmbusTransport>,
        families: &'static [&'static SmbusFamily],
    ) -> Self {
        Self { transport, families }
    }
}

/// Criteria plus the address, read as a 7-bit I²C address
#[derive(Debug)]
struct SmbusCriteria {
    common: Criteria,
    address: Option<u8>,
}

impl SmbusCriteria {
    fn accepts_address(&self, address: u8) -> bool {
        Criteria::accepts(&self.address, Some(&address))
    }
}

impl Bus for SmBus {
    fn name(&self) -> &'static str {
        SMBUS
    }

    fn find_devices(self: Box<Self>, filter: Filter) -> Result<DeviceStream> {
        let common = Criteria::from_filter(&filter)?;

        if !common.wants_bus(|bus| bus.starts_with("i2c-")) {
            debug!("Skipping smbus bus, filter asks for bus {:?}", common.bus);
            return Ok(Box::new(iter::empty()));
        }

        let address = match &common.address {
            None => None,
            Some(raw) => match parse_int(raw) {
                Some(n @ 0..=0x7f) => Some(n as u8),
                Some(n) => {
                    return Err(DeviceError::malformed_filter(format!(
                        "address {:#x} is not a 7-bit I2C address",
                        n
                    )))
                }
                None => {
                    trace!("Address {} cannot be on SMBus", raw);
                    return Ok(Box::new(iter::empty()));
                }
            },
        };

        let families: Vec<&'static SmbusFamily> = self
            .families
            .iter()
            .copied()
            .filter(|family| {
                let enabled = family.is_enabled(&common.unsafe_features);
                if !enabled {
                    debug!(
                        "Skipping {}, requires unsafe features {:?}",
                        family.name, family.unsafe_features
                    );
                }
                enabled
            })
            .collect();
        if families.is_empty() {
            return Ok(Box::new(iter::empty()));
        }

        let adapters = match self.transport.i2c_adapters() {
            Ok(adapters) => adapters,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No I2C adapters, is i2c-dev loaded?");
                return Ok(Box::new(iter::empty()));
            }
            Err(e) => return Err(unavailable(SMBUS, "I2C adapters", e)),
        };

        let criteria = Arc::new(SmbusCriteria { common, address });
        let transport = self.transport;

        Ok(Box::new(adapters.flat_map(move |adapter| -> DeviceStream {
            match adapter {
                Ok(adapter) => on_adapter(&transport, adapter, &families, &criteria),
                Err(e) => Box::new(iter::once(Err(DeviceError::transport(
                    SMBUS,
                    "failed to read I2C adapter",
                    e,
                )))),
            }
        })))
    }
}

/// Devices of the enabled families on one adapter, matched one at a time
fn on_adapter(
    transport: &Arc<dyn SmbusTransport>,
    adapter: I2cAdapterInfo,
    families: &[&'static SmbusFamily],
    criteria: &Arc<SmbusCriteria>,
) -> DeviceStream {
    if !Criteria::accepts(&criteria.common.bus, Some(&adapter.bus())) {
        return Box::new(iter::empty());
    }
    trace!("Looking for devices on {} ({})", adapter.bus(), adapter.name);

    let transport = Arc::clone(transport);
    let adapter = Arc::new(adapter);
    let criteria = Arc::clone(criteria);
    Box::new(
        families
            .to_vec()
            .into_iter()
            .flat_map(move |family| in_family(family, &transport, &adapter, &criteria)),
    )
}

fn in_family(
    family: &'static SmbusFamily,
    transport: &Arc<dyn SmbusTransport>,
    adapter: &Arc<I2cAdapterInfo>,
    criteria: &Arc<SmbusCriteria>,
) -> DeviceStream {
    match &family.matcher {
        SmbusMatch::Gpu {
            host_driver,
            adapter_prefix,
            devices,
        } => {
            if adapter.parent_driver.as_deref() != Some(*host_driver)
                || !adapter.name.starts_with(*adapter_prefix)
            {
                return Box::new(iter::empty());
            }

            let adapter = Arc::clone(adapter);
            let criteria = Arc::clone(criteria);
            Box::new(devices.iter().filter_map(move |gpu| {
                gpu_matches(gpu, &adapter, &criteria).then(|| {
                    Ok(driver(
                        family,
                        &adapter,
                        gpu.description,
                        (gpu.subsystem_vendor, gpu.subsystem_device),
                        gpu.address,
                    ))
                })
            }))
        }
        SmbusMatch::MemoryModule {
            host_drivers,
            spd_base,
            controller_base,
            slots,
            manufacturer,
            description,
        } => {
            let on_host = adapter
                .parent_driver
                .as_deref()
                .map_or(false, |d| host_drivers.iter().any(|host| *host == d));
            if !on_host
                || criteria.common.vendor.is_some()
                || criteria.common.product.is_some()
                || !criteria.common.matches_description(description)
            {
                return Box::new(iter::empty());
            }

            let (spd_base, controller_base, manufacturer, description) =
                (*spd_base, *controller_base, *manufacturer, *description);
            let transport = Arc::clone(transport);
            let adapter = Arc::clone(adapter);
            let criteria = Arc::clone(criteria);
            let mut failed = false;

            // SPD EEPROMs are read one slot per step of the stream
            Box::new((0..*slots).filter_map(move |slot| {
                let address = controller_base + slot;
                if failed || !criteria.accepts_address(address) {
                    return None;
                }
                match transport.spd_eeprom(&adapter, spd_base + slot) {
                    Ok(Some(spd)) if spd_manufacturer(&spd) == Some(manufacturer) => Some(Ok(
                        driver(family, &adapter, description, (0, 0), address),
                    )),
                    Ok(_) => None,
                    Err(e) => {
                        failed = true;
                        Some(Err(DeviceError::transport(
                            SMBUS,
                            format!(
                                "failed to read SPD at {:#04x} on {}",
                                spd_base + slot,
                                adapter.bus()
                            ),
                            e,
                        )))
                    }
                }
            }))
        }
    }
}

fn gpu_matches(gpu: &GpuDevice, adapter: &I2cAdapterInfo, criteria: &SmbusCriteria) -> bool {
    adapter.parent_vendor == Some(gpu.vendor)
        && adapter.parent_device == Some(gpu.device)
        && adapter.parent_subsystem_vendor == Some(gpu.subsystem_vendor)
        && adapter.parent_subsystem_device == Some(gpu.subsystem_device)
        && Criteria::accepts(&criteria.common.vendor, Some(&gpu.subsystem_vendor))
        && Criteria::accepts(&criteria.common.product, Some(&gpu.subsystem_device))
        && criteria.common.matches_description(gpu.description)
        && criteria.accepts_address(gpu.address)
        && criteria.common.release.is_none()
        && criteria.common.serial.is_none()
        && criteria.common.usb_port.is_none()
}

/// JEDEC manufacturer of a module, parity bit stripped from the bank
fn spd_manufacturer(spd: &[u8]) -> Option<(u8, u8)> {
    let bank = spd.get(SPD_MANUFACTURER_BANK)?;
    let code = spd.get(SPD_MANUFACTURER_CODE)?;
    Some((bank & 0x7f, *code))
}

fn driver(
    family: &SmbusFamily,
    adapter: &I2cAdapterInfo,
    description: &str,
    (vendor_id, product_id): (u16, u16),
    address: u8,
) -> Box<dyn Driver> {
    debug!("Instantiating {} driver for {} on {}", family.name, description, adapter.bus());
    Box::new(FamilyDriver::new(
        DriverInfo {
            description: description.to_string(),
            driver: family.name.to_string(),
            vendor_id,
            product_id,
            release_number: None,
            serial_number: None,
            bus: adapter.bus(),
            address: format!("{:#04x}", address),
            port: None,
            capabilities: family.capabilities.to_vec(),
        },
        DeviceHandle::new(&adapter.path),
    ))
}
