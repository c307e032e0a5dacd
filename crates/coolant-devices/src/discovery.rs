/*!
 * Device discovery for coolant.
 *
 * [`Discovery`] walks the registered buses in identifier order, probes them one
 * at a time and yields driver instances as they are produced. It is a plain
 * pull-based iterator: nothing is probed until the caller asks for the next
 * device, and dropping the iterator abandons the current bus stream (which
 * releases whatever it holds) without touching any later bus.
 *
 * With a pick index `k` only the `k`-th device of the global sequence is
 * yielded (zero-based, counted across all buses), after which discovery stops
 * immediately: neither the rest of the current bus nor any later bus is probed.
 *
 * Errors from a bus are passed through unchanged and end the discovery, so a
 * bus that cannot be accessed also hides the buses ordered after it.
 */
use std::iter::FusedIterator;

use coolant_core::logging;
use tracing::{debug, info, Span};

use crate::bus::DeviceStream;
use crate::driver::Driver;
use crate::error::Result;
use crate::filter::Filter;
use crate::registry::{self, BusEntry, BusRegistry};

/// Find devices on every bus of the process-wide registry
///
/// See [`Discovery`] for the iteration semantics.
pub fn find_devices(pick: Option<usize>, filter: Filter) -> Result<Discovery> {
    Discovery::new(registry::global(), pick, filter)
}

struct ActiveBus {
    name: String,
    /// Entered whenever the stream is pulled
    span: Span,
    devices: DeviceStream,
}

/// Lazy sequence of drivers across all registered buses
pub struct Discovery {
    pending: std::vec::IntoIter<BusEntry>,
    active: Option<ActiveBus>,
    filter: Filter,
    pick: Option<usize>,
    seen: usize,
    done: bool,
}

impl Discovery {
    /// Prepare discovery over the buses currently known to `registry`
    ///
    /// The registry is read once, here; buses registered afterwards are seen
    /// by the next discovery, not this one. No bus is probed until the first
    /// call to `next`.
    pub fn new(registry: &BusRegistry, pick: Option<usize>, filter: Filter) -> Result<Self> {
        let mut buses = registry.all_known()?;
        buses.sort_by(|a, b| a.name().cmp(b.name()));

        debug!(
            buses = ?buses.iter().map(BusEntry::name).collect::<Vec<_>>(),
            pick = ?pick,
            "Starting device discovery"
        );

        Ok(Self {
            pending: buses.into_iter(),
            active: None,
            filter,
            pick,
            seen: 0,
            done: false,
        })
    }

    /// Number of matching devices produced so far, yielded or skipped
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Drop the active stream and forget the remaining buses
    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(bus = %active.name, "Abandoning bus");
        }
        self.pending = Vec::new().into_iter();
        self.done = true;
    }

    /// Instantiate and probe the next bus, if any
    fn advance(&mut self) -> Option<Result<()>> {
        let entry = self.pending.next()?;
        let span = logging::component_span("bus", Some(entry.name()));
        let found = {
            let _guard = span.enter();
            debug!("Probing bus");
            entry.instantiate().find_devices(self.filter.clone())
        };

        match found {
            Ok(devices) => {
                self.active = Some(ActiveBus {
                    name: entry.name().to_string(),
                    span,
                    devices,
                });
                Some(Ok(()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl Iterator for Discovery {
    type Item = Result<Box<dyn Driver>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let Some(active) = self.active.as_mut() else {
                match self.advance() {
                    Some(Ok(())) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "Bus probe failed");
                        self.finish();
                        return Some(Err(e));
                    }
                    None => {
                        info!("Discovery finished after {} matching devices", self.seen);
                        self.done = true;
                        return None;
                    }
                }
            };

            let next = {
                let _guard = active.span.enter();
                active.devices.next()
            };

            match next {
                None => {
                    debug!(bus = %active.name, "Bus drained");
                    self.active = None;
                }
                Some(Err(e)) => {
                    debug!(bus = %active.name, error = %e, "Bus stream failed");
                    self.finish();
                    return Some(Err(e));
                }
                Some(Ok(driver)) => {
                    let index = self.seen;
                    self.seen += 1;
                    match self.pick {
                        None => {
                            debug!(index, description = driver.description(), "Found device");
                            return Some(Ok(driver));
                        }
                        Some(pick) if pick == index => {
                            debug!(index, description = driver.description(), "Picked device");
                            self.finish();
                            return Some(Ok(driver));
                        }
                        Some(_) => {
                            debug!(index, description = driver.description(), "Skipping device");
                        }
                    }
                }
            }
        }
    }
}

impl FusedIterator for Discovery {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::bus::Bus;
    use crate::driver::{DriverCapability, DriverInfo};
    use crate::error::DeviceError;

    /// Shared log of what the fake buses were asked to do
    #[derive(Debug, Default)]
    struct Probes {
        instantiated: Mutex<Vec<String>>,
        produced: AtomicUsize,
        filters: Mutex<Vec<Filter>>,
    }

    impl Probes {
        fn instantiated(&self) -> Vec<String> {
            self.instantiated.lock().unwrap().clone()
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Device(&'static str),
        Fail,
    }

    #[derive(Debug)]
    struct FakeBus {
        name: &'static str,
        steps: Vec<Step>,
        fail_on_probe: bool,
        probes: Arc<Probes>,
    }

    #[derive(Debug)]
    struct FakeDriver {
        info: DriverInfo,
    }

    impl Driver for FakeDriver {
        fn info(&self) -> &DriverInfo {
            &self.info
        }

        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            false
        }
    }

    fn fake_driver(bus: &str, description: &str) -> Box<dyn Driver> {
        Box::new(FakeDriver {
            info: DriverInfo {
                description: description.to_string(),
                driver: "fake".to_string(),
                vendor_id: 0,
                product_id: 0,
                release_number: None,
                serial_number: None,
                bus: bus.to_string(),
                address: description.to_string(),
                port: None,
                capabilities: vec![DriverCapability::Status],
            },
        })
    }

    impl Bus for FakeBus {
        fn name(&self) -> &'static str {
            self.name
        }

        fn find_devices(self: Box<Self>, filter: Filter) -> Result<DeviceStream> {
            let FakeBus {
                name,
                steps,
                fail_on_probe,
                probes,
            } = *self;

            probes.filters.lock().unwrap().push(filter);
            if fail_on_probe {
                return Err(DeviceError::transport_msg(name, "permission denied"));
            }

            Ok(Box::new(steps.into_iter().map(move |step| match step {
                Step::Device(description) => {
                    probes.produced.fetch_add(1, Ordering::SeqCst);
                    Ok(fake_driver(name, description))
                }
                Step::Fail => Err(DeviceError::transport_msg(name, "device vanished")),
            })))
        }
    }

    fn register(
        registry: &BusRegistry,
        probes: &Arc<Probes>,
        name: &'static str,
        steps: Vec<Step>,
        fail_on_probe: bool,
    ) {
        let probes = probes.clone();
        registry
            .register(name, format!("fake {}", name), move || {
                probes.instantiated.lock().unwrap().push(name.to_string());
                Box::new(FakeBus {
                    name,
                    steps: steps.clone(),
                    fail_on_probe,
                    probes: probes.clone(),
                })
            })
            .unwrap();
    }

    /// `HIDBus` yields d1, d2 and `SMBus` yields d3, registered out of order
    fn example_registry() -> (BusRegistry, Arc<Probes>) {
        let registry = BusRegistry::new();
        let probes = Arc::new(Probes::default());
        register(&registry, &probes, "SMBus", vec![Step::Device("d3")], false);
        register(
            &registry,
            &probes,
            "HIDBus",
            vec![Step::Device("d1"), Step::Device("d2")],
            false,
        );
        (registry, probes)
    }

    fn descriptions(discovery: Discovery) -> Vec<String> {
        discovery
            .map(|d| d.unwrap().description().to_string())
            .collect()
    }

    #[test]
    fn test_yields_all_in_bus_order() {
        let (registry, probes) = example_registry();
        let discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
        assert_eq!(descriptions(discovery), vec!["d1", "d2", "d3"]);
        assert_eq!(probes.instantiated(), vec!["HIDBus", "SMBus"]);
    }

    #[test]
    fn test_nothing_probed_before_first_next() {
        let (registry, probes) = example_registry();
        let _discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
        assert!(probes.instantiated().is_empty());
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let (registry, _) = example_registry();
        let first = descriptions(Discovery::new(&registry, None, Filter::new()).unwrap());
        let second = descriptions(Discovery::new(&registry, None, Filter::new()).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_pick_is_global_index() {
        let (registry, probes) = example_registry();
        let discovery = Discovery::new(&registry, Some(2), Filter::new()).unwrap();
        assert_eq!(descriptions(discovery), vec!["d3"]);
        // HIDBus was drained before SMBus was probed
        assert_eq!(probes.instantiated(), vec!["HIDBus", "SMBus"]);
        assert_eq!(probes.produced.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_pick_matches_unrestricted_sequence() {
        let (registry, _) = example_registry();
        let all = descriptions(Discovery::new(&registry, None, Filter::new()).unwrap());
        for (k, expected) in all.iter().enumerate() {
            let picked = descriptions(Discovery::new(&registry, Some(k), Filter::new()).unwrap());
            assert_eq!(&picked, &vec![expected.clone()]);
        }
    }

    #[test]
    fn test_pick_short_circuits_later_buses() {
        let (registry, probes) = example_registry();
        let mut discovery = Discovery::new(&registry, Some(0), Filter::new()).unwrap();

        let first = discovery.next().unwrap().unwrap();
        assert_eq!(first.description(), "d1");
        assert!(discovery.next().is_none());
        assert!(discovery.next().is_none());

        assert_eq!(probes.instantiated(), vec!["HIDBus"]);
        // d2 was never produced
        assert_eq!(probes.produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pick_out_of_range_is_empty() {
        let (registry, probes) = example_registry();
        let mut discovery = Discovery::new(&registry, Some(5), Filter::new()).unwrap();
        assert!(discovery.next().is_none());
        assert_eq!(discovery.seen(), 3);
        assert_eq!(probes.instantiated(), vec!["HIDBus", "SMBus"]);
    }

    #[test]
    fn test_early_drop_stops_probing() {
        let (registry, probes) = example_registry();
        {
            let mut discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
            assert_eq!(discovery.next().unwrap().unwrap().description(), "d1");
        }
        assert_eq!(probes.instantiated(), vec!["HIDBus"]);
        assert_eq!(probes.produced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mid_stream_error_aborts() {
        let registry = BusRegistry::new();
        let probes = Arc::new(Probes::default());
        register(
            &registry,
            &probes,
            "HIDBus",
            vec![Step::Device("d1"), Step::Fail, Step::Device("d2")],
            false,
        );
        register(&registry, &probes, "SMBus", vec![Step::Device("d3")], false);

        let mut discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
        assert_eq!(discovery.next().unwrap().unwrap().description(), "d1");

        let err = discovery.next().unwrap().unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.bus(), Some("HIDBus"));

        assert!(discovery.next().is_none());
        assert_eq!(probes.instantiated(), vec!["HIDBus"]);
    }

    #[test]
    fn test_error_aborts_regardless_of_pick() {
        let registry = BusRegistry::new();
        let probes = Arc::new(Probes::default());
        register(&registry, &probes, "HIDBus", vec![Step::Device("d1"), Step::Fail], false);
        register(&registry, &probes, "SMBus", vec![Step::Device("d3")], false);

        let results: Vec<_> = Discovery::new(&registry, Some(1), Filter::new())
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().is_err());
        assert_eq!(probes.instantiated(), vec!["HIDBus"]);
    }

    #[test]
    fn test_probe_failure_is_propagated_unchanged() {
        let registry = BusRegistry::new();
        let probes = Arc::new(Probes::default());
        register(&registry, &probes, "AAA", vec![Step::Device("a1")], false);
        register(&registry, &probes, "BBB", vec![], true);
        register(&registry, &probes, "CCC", vec![Step::Device("c1")], false);

        let results: Vec<_> = Discovery::new(&registry, None, Filter::new())
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().description(), "a1");
        match &results[1] {
            Err(DeviceError::Transport { bus, message, .. }) => {
                assert_eq!(bus, "BBB");
                assert_eq!(message, "permission denied");
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(probes.instantiated(), vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_filter_forwarded_verbatim() {
        let (registry, probes) = example_registry();
        let filter = Filter::new()
            .with("vendor", 0x1e71)
            .with("only_meaningful_elsewhere", "x");

        let _ = Discovery::new(&registry, None, filter.clone())
            .unwrap()
            .count();

        let seen = probes.filters.lock().unwrap().clone();
        assert_eq!(seen, vec![filter.clone(), filter]);
    }

    #[test]
    fn test_empty_registry_yields_nothing() {
        let registry = BusRegistry::new();
        let mut discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
        assert!(discovery.next().is_none());
    }

    #[test]
    fn test_new_bus_seen_by_next_call() {
        let (registry, probes) = example_registry();
        assert_eq!(
            descriptions(Discovery::new(&registry, None, Filter::new()).unwrap()).len(),
            3
        );

        register(&registry, &probes, "AMDBus", vec![Step::Device("d0")], false);
        assert_eq!(
            descriptions(Discovery::new(&registry, None, Filter::new()).unwrap()),
            vec!["d0", "d1", "d2", "d3"]
        );
    }

    #[test]
    fn test_registry_snapshot_taken_at_creation() {
        let (registry, probes) = example_registry();
        let discovery = Discovery::new(&registry, None, Filter::new()).unwrap();
        register(&registry, &probes, "AMDBus", vec![Step::Device("d0")], false);
        assert_eq!(descriptions(discovery), vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_each_pass_instantiates_fresh_buses() {
        let (registry, probes) = example_registry();
        let _ = Discovery::new(&registry, None, Filter::new()).unwrap().count();
        let _ = Discovery::new(&registry, None, Filter::new()).unwrap().count();
        assert_eq!(
            probes.instantiated(),
            vec!["HIDBus", "SMBus", "HIDBus", "SMBus"]
        );
    }
}
