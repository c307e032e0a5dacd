/*!
 * Raw USB enumeration through `/sys/bus/usb/devices`.
 */
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use super::{read_attr, sorted_entries, Enumeration, Sysfs};
use crate::filter::parse_hex_id;

/// A USB device as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    /// usbfs device node (`/dev/bus/usb/001/004`)
    pub path: PathBuf,
    /// Vendor id
    pub vendor_id: u16,
    /// Product id
    pub product_id: u16,
    /// Release number (bcdDevice)
    pub release_number: Option<u16>,
    /// Serial number
    pub serial_number: Option<String>,
    /// Product name reported by the device
    pub product: Option<String>,
    /// Bus number
    pub bus_number: u16,
    /// Device number on the bus
    pub device_number: u16,
    /// Physical port path (`3.2`); `None` for root hubs
    pub port: Option<String>,
}

impl UsbDeviceInfo {
    /// Bus name (`usb1`)
    pub fn bus(&self) -> String {
        format!("usb{}", self.bus_number)
    }

    /// Address of the device on its bus
    pub fn address(&self) -> String {
        self.device_number.to_string()
    }
}

/// Enumerates USB devices
pub trait UsbTransport: Debug + Send + Sync {
    /// Lazily list the USB devices currently present
    fn usb_devices(&self) -> io::Result<Enumeration<UsbDeviceInfo>>;
}

impl UsbTransport for Sysfs {
    fn usb_devices(&self) -> io::Result<Enumeration<UsbDeviceInfo>> {
        let devices_dir = self.sys_root().join("bus/usb/devices");
        let names = sorted_entries(&devices_dir)?;
        let dev_root = self.dev_root().to_path_buf();

        Ok(Box::new(
            names
                .into_iter()
                // Interfaces look like `1-3:1.0`
                .filter(|name| !name.contains(':'))
                .filter_map(move |name| read_usb_device(&devices_dir.join(&name), &dev_root).map(Ok)),
        ))
    }
}

fn read_usb_device(dir: &Path, dev_root: &Path) -> Option<UsbDeviceInfo> {
    let vendor_id = read_attr(&dir.join("idVendor")).and_then(|s| parse_hex_id(&s))?;
    let product_id = read_attr(&dir.join("idProduct")).and_then(|s| parse_hex_id(&s))?;
    let bus_number: u16 = read_attr(&dir.join("busnum"))?.parse().ok()?;
    let device_number: u16 = read_attr(&dir.join("devnum"))?.parse().ok()?;

    Some(UsbDeviceInfo {
        path: dev_root
            .join("bus/usb")
            .join(format!("{:03}", bus_number))
            .join(format!("{:03}", device_number)),
        vendor_id,
        product_id,
        release_number: read_attr(&dir.join("bcdDevice")).and_then(|s| parse_hex_id(&s)),
        serial_number: read_attr(&dir.join("serial")),
        product: read_attr(&dir.join("product")),
        bus_number,
        device_number,
        port: read_attr(&dir.join("devpath")).filter(|p| p != "0"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_device(dir: &Path, attrs: &[(&str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        for (name, value) in attrs {
            fs::write(dir.join(name), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn test_enumerate_usb_devices() {
        let root = tempdir().unwrap();
        let devices = root.path().join("sys/bus/usb/devices");
        write_device(
            &devices.join("usb1"),
            &[("idVendor", "1d6b"), ("idProduct", "0002"), ("busnum", "1"), ("devnum", "1"), ("devpath", "0")],
        );
        write_device(
            &devices.join("1-3"),
            &[
                ("idVendor", "2433"),
                ("idProduct", "b200"),
                ("bcdDevice", "0100"),
                ("busnum", "1"),
                ("devnum", "4"),
                ("devpath", "3"),
                ("product", "Asetek 690LC"),
            ],
        );
        fs::create_dir_all(devices.join("1-3:1.0")).unwrap();

        let sysfs = Sysfs::new(root.path().join("sys"), root.path().join("dev"));
        let found: Vec<UsbDeviceInfo> = sysfs
            .usb_devices()
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();

        assert_eq!(found.len(), 2);
        let asetek = &found[0];
        assert_eq!((asetek.vendor_id, asetek.product_id), (0x2433, 0xb200));
        assert_eq!(asetek.release_number, Some(0x0100));
        assert_eq!(asetek.bus(), "usb1");
        assert_eq!(asetek.address(), "4");
        assert_eq!(asetek.port.as_deref(), Some("3"));
        assert_eq!(asetek.path, root.path().join("dev/bus/usb/001/004"));

        let hub = &found[1];
        assert_eq!(hub.vendor_id, 0x1d6b);
        assert_eq!(hub.port, None);
    }
}
