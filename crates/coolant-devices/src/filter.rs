/*!
 * Filter criteria forwarded to buses.
 *
 * A [`Filter`] is an open mapping of named constraints. The discovery engine
 * passes it unmodified to every bus; each bus reads the keys it understands
 * and ignores the rest, so a caller may mix vocabulary meant for different
 * buses in one filter. Unknown keys are never an error.
 */
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use coolant_core::types::{Metadata, Value};

use crate::error::{DeviceError, Result};

/// USB/PCI vendor id
pub const VENDOR: &str = "vendor";
/// USB/PCI product id
pub const PRODUCT: &str = "product";
/// Device release number (bcdDevice)
pub const RELEASE: &str = "release";
/// Serial number
pub const SERIAL: &str = "serial";
/// Bus name as reported by the transport (`hid`, `usb1`, `i2c-3`)
pub const BUS: &str = "bus";
/// Address on the bus (device node, USB device number, I²C address)
pub const ADDRESS: &str = "address";
/// Physical USB port path (`3.2`)
pub const USB_PORT: &str = "usb_port";
/// Case-insensitive substring of the device description
pub const MATCH: &str = "match";
/// Opt-in features that allow probing potentially unsafe buses
pub const UNSAFE: &str = "unsafe";
/// Select the legacy firmware variant of Asetek 690LC coolers
pub const LEGACY_690LC: &str = "legacy_690lc";

/// Open mapping of filter criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    criteria: BTreeMap<String, Value>,
}

impl Filter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion, builder style
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a criterion
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.criteria.insert(key.into(), value.into());
    }

    /// Raw access to a criterion
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.criteria.get(key)
    }

    /// Whether a criterion is present
    pub fn contains(&self, key: &str) -> bool {
        self.criteria.contains_key(key)
    }

    /// Whether the filter carries no criteria
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Iterate over all criteria in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.criteria.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` onto this filter; keys in `other` win
    pub fn merge(&mut self, other: &Filter) {
        for (key, value) in &other.criteria {
            self.criteria.insert(key.clone(), value.clone());
        }
    }

    /// Read a criterion as a 16-bit id
    ///
    /// Accepts integers and strings in decimal or `0x` hexadecimal notation.
    pub fn get_u16(&self, key: &str) -> Result<Option<u16>> {
        let Some(value) = self.non_null(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Integer(i) => u16::try_from(*i).ok(),
            Value::String(s) => parse_int(s).and_then(|i| u16::try_from(i).ok()),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| DeviceError::malformed_filter(format!("{} must be a 16-bit id, got {}", key, value)))
    }

    /// Read a criterion as a flag; absent means `false`
    ///
    /// Accepts booleans, `0`/`1` and the strings `true`/`false`.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let Some(value) = self.non_null(key) else {
            return Ok(false);
        };
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(DeviceError::malformed_filter(format!(
                "{} must be a boolean, got {}",
                key, other
            ))),
        }
    }

    /// Read a criterion as a string; integers are rendered in decimal
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.non_null(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Integer(i)) => Ok(Some(i.to_string())),
            Some(other) => Err(DeviceError::malformed_filter(format!(
                "{} must be a string, got {}",
                key,
                other.type_name()
            ))),
        }
    }

    /// Read a criterion as a list of strings
    ///
    /// A single string is split on commas.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.non_null(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        DeviceError::malformed_filter(format!("{} entries must be strings", key))
                    })
                })
                .collect(),
            Some(other) => Err(DeviceError::malformed_filter(format!(
                "{} must be a list of strings, got {}",
                key,
                other.type_name()
            ))),
        }
    }

    /// Vendor id criterion
    pub fn vendor(&self) -> Result<Option<u16>> {
        self.get_u16(VENDOR)
    }

    /// Product id criterion
    pub fn product(&self) -> Result<Option<u16>> {
        self.get_u16(PRODUCT)
    }

    /// Release number criterion
    pub fn release(&self) -> Result<Option<u16>> {
        self.get_u16(RELEASE)
    }

    /// Serial number criterion
    pub fn serial(&self) -> Result<Option<String>> {
        self.get_string(SERIAL)
    }

    /// Bus name criterion
    pub fn bus(&self) -> Result<Option<String>> {
        self.get_string(BUS)
    }

    /// Address criterion, uninterpreted
    pub fn address(&self) -> Result<Option<String>> {
        self.get_string(ADDRESS)
    }

    /// USB port criterion
    pub fn usb_port(&self) -> Result<Option<String>> {
        self.get_string(USB_PORT)
    }

    /// Description substring criterion, lowercased
    pub fn description_match(&self) -> Result<Option<String>> {
        Ok(self.get_string(MATCH)?.map(|s| s.to_lowercase()))
    }

    /// Enabled unsafe features, lowercased
    pub fn unsafe_features(&self) -> Result<Vec<String>> {
        Ok(self
            .get_list(UNSAFE)?
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect())
    }

    /// Legacy Asetek 690LC flag
    pub fn legacy_690lc(&self) -> Result<bool> {
        self.get_bool(LEGACY_690LC)
    }

    fn non_null(&self, key: &str) -> Option<&Value> {
        self.criteria.get(key).filter(|v| !v.is_null())
    }
}

impl From<Metadata> for Filter {
    fn from(criteria: Metadata) -> Self {
        Self { criteria }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            criteria: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Parse a bare hexadecimal id as found in sysfs (`1e71`, `0x1e71`)
pub fn parse_hex_id(s: &str) -> Option<u16> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(s, 16).ok()
}
