/*!
 * I²C/SMBus adapter enumeration through `/sys/bus/i2c/devices`.
 */
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{read_attr, sorted_entries, Enumeration, Sysfs};
use crate::filter::parse_hex_id;

/// An I²C adapter and the PCI device it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cAdapterInfo {
    /// Adapter number
    pub number: u32,
    /// i2c-dev node (`/dev/i2c-3`)
    pub path: PathBuf,
    /// Adapter name (`SMBus I801 adapter at efa0`)
    pub name: String,
    /// Parent PCI vendor id
    pub parent_vendor: Option<u16>,
    /// Parent PCI device id
    pub parent_device: Option<u16>,
    /// Parent PCI subsystem vendor id
    pub parent_subsystem_vendor: Option<u16>,
    /// Parent PCI subsystem device id
    pub parent_subsystem_device: Option<u16>,
    /// Kernel driver bound to the parent device
    pub parent_driver: Option<String>,
}

impl I2cAdapterInfo {
    /// Bus name (`i2c-3`)
    pub fn bus(&self) -> String {
        format!("i2c-{}", self.number)
    }
}

/// Enumerates SMBus/I²C adapters
pub trait SmbusTransport: Debug + Send + Sync {
    /// Lazily list the I²C adapters currently present
    fn i2c_adapters(&self) -> io::Result<Enumeration<I2cAdapterInfo>>;

    /// Contents of the DDR4 SPD EEPROM at `address` on `adapter`
    ///
    /// `None` when no SPD EEPROM driver is bound there.
    fn spd_eeprom(&self, adapter: &I2cAdapterInfo, address: u8) -> io::Result<Option<Vec<u8>>>;
}

/// Kernel driver exposing DDR4 SPD EEPROMs
pub const SPD_DRIVER: &str = "ee1004";

impl SmbusTransport for Sysfs {
    fn i2c_adapters(&self) -> io::Result<Enumeration<I2cAdapterInfo>> {
        let devices_dir = self.sys_root().join("bus/i2c/devices");
        let names = sorted_entries(&devices_dir)?;
        let dev_root = self.dev_root().to_path_buf();

        Ok(Box::new(names.into_iter().filter_map(move |name| {
            // Clients look like `3-0058`
            let number: u32 = name.strip_prefix("i2c-")?.parse().ok()?;
            Some(Ok(read_adapter(
                number,
                &devices_dir.join(&name),
                dev_root.join(&name),
            )))
        })))
    }

    fn spd_eeprom(&self, adapter: &I2cAdapterInfo, address: u8) -> io::Result<Option<Vec<u8>>> {
        let client = self
            .sys_root()
            .join("bus/i2c/devices")
            .join(format!("{}-{:04x}", adapter.number, address));

        if read_attr(&client.join("name")).as_deref() != Some(SPD_DRIVER) {
            return Ok(None);
        }
        match fs::read(client.join("eeprom")) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn read_adapter(number: u32, dir: &Path, path: PathBuf) -> I2cAdapterInfo {
    let parent = dir.join("device");
    let read_id = |attr: &str| read_attr(&parent.join(attr)).and_then(|s| parse_hex_id(&s));

    I2cAdapterInfo {
        number,
        path,
        name: read_attr(&dir.join("name")).unwrap_or_default(),
        parent_vendor: read_id("vendor"),
        parent_device: read_id("device"),
        parent_subsystem_vendor: read_id("subsystem_vendor"),
        parent_subsystem_device: read_id("subsystem_device"),
        parent_driver: fs::read_link(parent.join("driver"))
            .ok()
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned())),
    }
}
