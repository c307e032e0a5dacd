/*!
 * hidraw enumeration.
 */
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{read_attr, sorted_entries, Enumeration, Sysfs};
use crate::filter::parse_hex_id;

/// A HID device as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidDeviceInfo {
    /// Device node (`/dev/hidraw0`)
    pub path: PathBuf,
    /// HID bus type (3 = USB, 5 = Bluetooth)
    pub bus_type: u16,
    /// Vendor id
    pub vendor_id: u16,
    /// Product id
    pub product_id: u16,
    /// Release number of the parent USB device
    pub release_number: Option<u16>,
    /// Serial number
    pub serial_number: Option<String>,
    /// Product name reported by the device
    pub product: Option<String>,
    /// Physical USB port path
    pub port: Option<String>,
}

impl HidDeviceInfo {
    /// Address of the device on the HID bus, its device node
    pub fn address(&self) -> String {
        self.path.display().to_string()
    }
}

/// Enumerates HID devices
pub trait HidTransport: Debug + Send + Sync {
    /// Lazily list the HID devices currently present
    fn hid_devices(&self) -> io::Result<Enumeration<HidDeviceInfo>>;
}

impl HidTransport for Sysfs {
    fn hid_devices(&self) -> io::Result<Enumeration<HidDeviceInfo>> {
        let class_dir = self.sys_root().join("class/hidraw");
        let names = sorted_entries(&class_dir)?;
        let dev_root = self.dev_root().to_path_buf();

        Ok(Box::new(names.into_iter().filter_map(move |name| {
            let entry = class_dir.join(&name);
            match read_hidraw(&entry, &dev_root.join(&name)) {
                Ok(Some(info)) => Some(Ok(info)),
                Ok(None) => None,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} vanished during enumeration", name);
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}

fn read_hidraw(entry: &Path, node: &Path) -> io::Result<Option<HidDeviceInfo>> {
    let device = entry.join("device");
    let uevent = std::fs::read_to_string(device.join("uevent"))?;

    let mut hid_id = None;
    let mut name = None;
    let mut phys = None;
    let mut uniq = None;
    for line in uevent.lines() {
        match line.split_once('=') {
            Some(("HID_ID", v)) => hid_id = Some(v.trim().to_string()),
            Some(("HID_NAME", v)) => name = Some(v.trim().to_string()),
            Some(("HID_PHYS", v)) => phys = Some(v.trim().to_string()),
            Some(("HID_UNIQ", v)) => uniq = Some(v.trim().to_string()),
            _ => {}
        }
    }

    let Some((bus_type, vendor_id, product_id)) = hid_id.as_deref().and_then(parse_hid_id) else {
        warn!("Ignoring {}: missing or malformed HID_ID", entry.display());
        return Ok(None);
    };

    // The USB device sits two levels above the HID device (past the interface)
    let usb_device = device.join("../..");
    let release_number = read_attr(&usb_device.join("bcdDevice")).and_then(|s| parse_hex_id(&s));
    let serial_number = uniq
        .filter(|s| !s.is_empty())
        .or_else(|| read_attr(&usb_device.join("serial")));

    Ok(Some(HidDeviceInfo {
        path: node.to_path_buf(),
        bus_type,
        vendor_id,
        product_id,
        release_number,
        serial_number,
        product: name.filter(|s| !s.is_empty()),
        port: phys.as_deref().and_then(port_from_phys),
    }))
}

/// Parse `HID_ID=0003:00001E71:0000170E`
fn parse_hid_id(s: &str) -> Option<(u16, u16, u16)> {
    let mut parts = s.split(':');
    let bus = u32::from_str_radix(parts.next()?, 16).ok()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;
    Some((
        u16::try_from(bus).ok()?,
        u16::try_from(vendor).ok()?,
        u16::try_from(product).ok()?,
    ))
}

/// Extract the port path from `HID_PHYS=usb-0000:00:14.0-3.2/input0`
fn port_from_phys(phys: &str) -> Option<String> {
    let location = phys.strip_prefix("usb-")?.split('/').next()?;
    let (_, port) = location.rsplit_once('-')?;
    (!port.is_empty()).then(|| port.to_string())
}
