/*!
 * Error types for bus probing and driver handling.
 */
use std::io;

use thiserror::Error;

use coolant_core::error::Error as CoreError;

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The bus itself cannot be accessed (permissions, missing kernel driver)
    #[error("{bus} bus unavailable: {message}")]
    Transport {
        /// Identifier of the bus that failed
        bus: String,
        /// What went wrong, with a hint where one exists
        message: String,
        /// Underlying OS error, if any
        #[source]
        source: Option<io::Error>,
    },

    /// A recognized filter criterion carries a value the bus cannot use
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// A bus with the same identifier is already registered
    #[error("Bus {0} is already registered")]
    AlreadyRegistered(String),

    /// The driver has no open handle
    #[error("Device not connected")]
    NotConnected,

    /// Opening a device node was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error on an individual device
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Create a transport error from an OS error
    pub fn transport<B: AsRef<str>, M: AsRef<str>>(bus: B, message: M, source: io::Error) -> Self {
        DeviceError::Transport {
            bus: bus.as_ref().to_string(),
            message: message.as_ref().to_string(),
            source: Some(source),
        }
    }

    /// Create a transport error without an underlying OS error
    pub fn transport_msg<B: AsRef<str>, M: AsRef<str>>(bus: B, message: M) -> Self {
        DeviceError::Transport {
            bus: bus.as_ref().to_string(),
            message: message.as_ref().to_string(),
            source: None,
        }
    }

    /// Create a malformed filter error
    pub fn malformed_filter<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::MalformedFilter(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Other(msg.as_ref().to_string())
    }

    /// Whether this error means a whole bus could not be accessed
    pub fn is_transport(&self) -> bool {
        matches!(self, DeviceError::Transport { .. })
    }

    /// Identifier of the failing bus, for transport errors
    pub fn bus(&self) -> Option<&str> {
        match self {
            DeviceError::Transport { bus, .. } => Some(bus),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_error() {
        let err = DeviceError::transport(
            "hid",
            "cannot read /sys/class/hidraw",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_transport());
        assert_eq!(err.bus(), Some("hid"));
        assert_eq!(err.to_string(), "hid bus unavailable: cannot read /sys/class/hidraw");
        assert!(err.source().is_some());

        let err = DeviceError::transport_msg("smbus", "no adapters");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_other_errors_are_not_transport() {
        assert!(!DeviceError::malformed_filter("vendor").is_transport());
        assert!(!DeviceError::NotConnected.is_transport());
        assert_eq!(DeviceError::NotConnected.bus(), None);
    }
}
