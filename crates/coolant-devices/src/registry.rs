/*!
 * Bus registry for coolant.
 *
 * The registry maps a bus identifier to a constructor for that bus. It is
 * append-only: buses are registered during initialization and never removed,
 * so a query only ever sees the set grow. Querying before every bus has been
 * registered is fine and simply returns what is known so far.
 */
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::bus::Bus;
use crate::error::{DeviceError, Result};

/// Constructor producing a fresh bus instance
pub type BusFactory = Arc<dyn Fn() -> Box<dyn Bus> + Send + Sync>;

/// A registered bus
#[derive(Clone)]
pub struct BusEntry {
    name: String,
    description: String,
    factory: BusFactory,
}

impl BusEntry {
    /// Bus identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Construct a fresh instance of the bus
    pub fn instantiate(&self) -> Box<dyn Bus> {
        (self.factory)()
    }
}

impl fmt::Debug for BusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Bus registry
#[derive(Debug, Default)]
pub struct BusRegistry {
    entries: RwLock<BTreeMap<String, BusEntry>>,
}

impl BusRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bus under `name`
    ///
    /// Fails with [`DeviceError::AlreadyRegistered`] if the identifier is
    /// taken; the existing entry is left untouched.
    pub fn register<N, D, F>(&self, name: N, description: D, factory: F) -> Result<()>
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn() -> Box<dyn Bus> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut entries = self.entries.write().map_err(|_| {
            DeviceError::Other("Failed to acquire write lock on bus registry".to_string())
        })?;

        if entries.contains_key(&name) {
            return Err(DeviceError::AlreadyRegistered(name));
        }

        let entry = BusEntry {
            name: name.clone(),
            description: description.into(),
            factory: Arc::new(factory),
        };
        entries.insert(name.clone(), entry);
        info!("Registered bus {}", name);

        Ok(())
    }

    /// Register a bus unless the identifier is already taken
    ///
    /// Returns whether the bus was added.
    pub fn register_once<N, D, F>(&self, name: N, description: D, factory: F) -> Result<bool>
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn() -> Box<dyn Bus> + Send + Sync + 'static,
    {
        match self.register(name, description, factory) {
            Ok(()) => Ok(true),
            Err(DeviceError::AlreadyRegistered(name)) => {
                debug!("Bus {} already registered", name);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// All currently registered buses, ordered by identifier
    pub fn all_known(&self) -> Result<Vec<BusEntry>> {
        let entries = self.entries.read().map_err(|_| {
            DeviceError::Other("Failed to acquire read lock on bus registry".to_string())
        })?;

        Ok(entries.values().cloned().collect())
    }

    /// Look up a bus by identifier
    pub fn get(&self, name: &str) -> Result<Option<BusEntry>> {
        let entries = self.entries.read().map_err(|_| {
            DeviceError::Other("Failed to acquire read lock on bus registry".to_string())
        })?;

        Ok(entries.get(name).cloned())
    }

    /// Check if a bus is registered
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Count registered buses
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| {
            DeviceError::Other("Failed to acquire read lock on bus registry".to_string())
        })?;

        Ok(entries.len())
    }

    /// Whether no bus has been registered yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

static GLOBAL: Lazy<BusRegistry> = Lazy::new(BusRegistry::new);

/// The process-wide registry used by [`find_devices`](crate::discovery::find_devices)
pub fn global() -> &'static BusRegistry {
    &GLOBAL
}

/// Register a bus in the process-wide registry
pub fn register_bus<N, D, F>(name: N, description: D, factory: F) -> Result<()>
where
    N: Into<String>,
    D: Into<String>,
    F: Fn() -> Box<dyn Bus> + Send + Sync + 'static,
{
    global().register(name, description, factory)
}
