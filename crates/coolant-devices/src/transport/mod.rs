/*!
 * OS transport primitives.
 *
 * Buses do not talk to the kernel directly; they enumerate devices through
 * the [`HidTransport`], [`UsbTransport`] and [`SmbusTransport`] traits and
 * hand each matched device a [`DeviceHandle`]. The [`Sysfs`] implementation
 * reads Linux sysfs and opens the matching device nodes.
 */
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use coolant_core::config::DiscoveryConfig;

use crate::error::{DeviceError, Result};

pub mod hid;
pub mod i2c;
pub mod usb;

pub use hid::{HidDeviceInfo, HidTransport};
pub use i2c::{I2cAdapterInfo, SmbusTransport};
pub use usb::{UsbDeviceInfo, UsbTransport};

/// Lazy enumeration of transport-level device descriptors
pub type Enumeration<T> = Box<dyn Iterator<Item = io::Result<T>>>;

/// Linux sysfs/devfs transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    sys_root: PathBuf,
    dev_root: PathBuf,
}

impl Sysfs {
    /// Create a transport rooted at the given sysfs and devfs mount points
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(sys_root: S, dev_root: D) -> Self {
        Self {
            sys_root: sys_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Create a transport from the discovery configuration
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(&config.sysfs_root, &config.devfs_root)
    }

    /// sysfs mount point
    pub fn sys_root(&self) -> &Path {
        &self.sys_root
    }

    /// devfs mount point
    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/sys", "/dev")
    }
}

/// Exclusive handle to a transport-level device
///
/// The handle knows the device node it refers to and opens it on demand.
/// It is not `Clone`; whoever owns it owns the device. The node is closed on
/// [`close`](DeviceHandle::close) or when the handle is dropped.
#[derive(Debug)]
pub struct DeviceHandle {
    path: PathBuf,
    file: Option<File>,
}

impl DeviceHandle {
    /// Create a closed handle for the device node at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the device node is open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Open the device node for reading and writing
    pub fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    DeviceError::PermissionDenied(format!("{}: {}", self.path.display(), e))
                }
                _ => DeviceError::Io(e),
            })?;
        self.file = Some(file);
        Ok(())
    }

    /// Close the device node
    pub fn close(&mut self) {
        self.file = None;
    }

    /// The open device node
    pub fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(DeviceError::NotConnected)
    }
}

/// Read a sysfs attribute, trimmed; missing or empty attributes are `None`
pub(crate) fn read_attr(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Directory entry names in natural order (`hidraw2` before `hidraw10`)
pub(crate) fn sorted_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort_by(|a, b| natural_cmp(a, b));
    Ok(names)
}

/// Compare strings treating runs of digits as numbers
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = a.peek().copied().filter(char::is_ascii_digit) {
                    na.push(c);
                    a.next();
                }
                let mut nb = String::new();
                while let Some(c) = b.peek().copied().filter(char::is_ascii_digit) {
                    nb.push(c);
                    b.next();
                }
                let na = na.trim_start_matches('0');
                let nb = nb.trim_start_matches('0');
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["hidraw10", "hidraw2", "hidraw1", "i2c-12", "i2c-3"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["hidraw1", "hidraw2", "hidraw10", "i2c-3", "i2c-12"]);
        assert_eq!(natural_cmp("1-3.2", "1-3.10"), Ordering::Less);
        assert_eq!(natural_cmp("usb1", "usb1"), Ordering::Equal);
    }

    #[test]
    fn test_read_attr() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("idVendor"), "1e71\n").unwrap();
        fs::write(dir.path().join("serial"), "\n").unwrap();

        assert_eq!(read_attr(&dir.path().join("idVendor")).as_deref(), Some("1e71"));
        assert_eq!(read_attr(&dir.path().join("serial")), None);
        assert_eq!(read_attr(&dir.path().join("missing")), None);
    }

    #[test]
    fn test_sorted_entries_missing_dir() {
        let err = sorted_entries(Path::new("/nonexistent/coolant")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_handle_lifecycle() {
        let dir = tempdir().unwrap();
        let node = dir.path().join("hidraw0");
        fs::write(&node, b"").unwrap();

        let mut handle = DeviceHandle::new(&node);
        assert!(!handle.is_open());
        assert!(matches!(handle.file(), Err(DeviceError::NotConnected)));

        handle.open().unwrap();
        assert!(handle.is_open());
        assert!(handle.file().is_ok());

        handle.close();
        assert!(!handle.is_open());
    }

    #[test]
    fn test_handle_open_missing_node() {
        let mut handle = DeviceHandle::new("/nonexistent/hidraw9");
        assert!(matches!(handle.open(), Err(DeviceError::Io(_))));
        assert!(!handle.is_open());
    }
}
