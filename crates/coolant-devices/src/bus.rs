/*!
 * Bus backend trait.
 *
 * A bus is one transport class (hidraw, raw USB, SMBus). It is constructed
 * fresh for every discovery pass, probed once and then dropped.
 */
use std::fmt::Debug;

use crate::driver::Driver;
use crate::error::Result;
use crate::filter::Filter;

/// Lazy, finite sequence of drivers produced by one bus
///
/// An `Err` item aborts the sequence; consumers stop at the first one.
/// Anything the stream holds open is released when it is dropped, including
/// when the consumer stops early.
pub type DeviceStream = Box<dyn Iterator<Item = Result<Box<dyn Driver>>>>;

/// Bus backend trait
pub trait Bus: Debug {
    /// Get the bus identifier, also used for ordering
    fn name(&self) -> &'static str;

    /// Probe the bus for devices matching `filter`
    ///
    /// Unknown filter keys are ignored. An empty stream means no matching
    /// device is present and is not an error. When the bus cannot be accessed
    /// at all this returns (or the stream later yields) a
    /// [`DeviceError::Transport`](crate::error::DeviceError::Transport).
    fn find_devices(self: Box<Self>, filter: Filter) -> Result<DeviceStream>;
}
