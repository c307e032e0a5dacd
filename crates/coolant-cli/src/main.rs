//! Command line front end for coolant
//!
//! Lists the cooling and lighting devices found on the registered buses.
//!
//! # Usage
//!
//! ```bash
//! coolant list --vendor 0x1e71 -v
//! coolant list --unsafe smbus,vengeance_rgb --json
//! coolant buses
//! ```
//!
//! Exit status is 0 on success (including when no device matches), 2 when a
//! bus could not be accessed and 64 when a filter value is malformed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coolant_core::config::{Config, ConfigBuilder};
use coolant_core::logging;
use coolant_core::types::Value;
use coolant_devices::{filter, DeviceError, Driver, DriverInfo, Filter};

const EXIT_FAILURE: u8 = 1;
const EXIT_TRANSPORT: u8 = 2;
/// sysexits EX_USAGE
const EXIT_USAGE: u8 = 64;

#[derive(Parser)]
#[command(name = "coolant", version)]
#[command(about = "Find cooling and lighting devices", long_about = None)]
struct Cli {
    /// Configuration file (TOML format)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'g', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List matching devices
    List(ListArgs),

    /// Show the registered buses
    Buses,

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Only yield the N-th matching device (zero-based)
    #[arg(long, value_name = "N")]
    pick: Option<usize>,

    /// Filter by vendor id
    #[arg(long)]
    vendor: Option<String>,

    /// Filter by product id
    #[arg(long)]
    product: Option<String>,

    /// Filter by release number
    #[arg(long)]
    release: Option<String>,

    /// Filter by serial number
    #[arg(long)]
    serial: Option<String>,

    /// Filter by bus (hid, usb1, i2c-3)
    #[arg(long)]
    bus: Option<String>,

    /// Filter by address on the bus
    #[arg(long)]
    address: Option<String>,

    /// Filter by USB port path
    #[arg(long)]
    usb_port: Option<String>,

    /// Filter by substring of the description
    #[arg(long = "match", value_name = "SUBSTRING")]
    description: Option<String>,

    /// Comma-separated unsafe features to enable
    #[arg(long = "unsafe", value_name = "FEATURES")]
    unsafe_features: Option<String>,

    /// Select the legacy driver for Asetek 690LC coolers (older NZXT Krakens)
    #[arg(long = "legacy-690lc")]
    legacy_690lc: bool,

    /// Additional criterion, value parsed as JSON when possible
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    extra: Vec<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Show device details
    #[arg(short, long)]
    verbose: bool,
}

impl ListArgs {
    /// Criteria given on the command line
    fn to_filter(&self) -> Result<Filter> {
        let mut filter = Filter::new();
        let named = [
            (filter::VENDOR, &self.vendor),
            (filter::PRODUCT, &self.product),
            (filter::RELEASE, &self.release),
            (filter::SERIAL, &self.serial),
            (filter::BUS, &self.bus),
            (filter::ADDRESS, &self.address),
            (filter::USB_PORT, &self.usb_port),
            (filter::MATCH, &self.description),
            (filter::UNSAFE, &self.unsafe_features),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                filter.insert(key, value.as_str());
            }
        }
        if self.legacy_690lc {
            filter.insert(filter::LEGACY_690LC, true);
        }

        for item in &self.extra {
            let (key, raw) = item
                .split_once('=')
                .with_context(|| format!("expected KEY=VALUE, got {:?}", item))?;
            let value = serde_json::from_str::<serde_json::Value>(raw)
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(raw));
            filter.insert(key.trim(), value);
        }

        Ok(filter)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::from(exit_status(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let mut logging_config = config.logging.clone();
    if cli.debug {
        logging_config.level = "debug".to_string();
    }
    logging::init_with_config(&logging_config)?;

    coolant_devices::init_with_config(&config.discovery)?;

    match cli.command {
        Commands::List(args) => list(&config, &args),
        Commands::Buses => buses(),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut builder = ConfigBuilder::new();
    if let Some(path) = &cli.config {
        builder = builder.with_required_config_file(path);
    }
    let config = builder.with_environment_prefix("COOLANT").build()?;
    Ok(config)
}

fn list(config: &Config, args: &ListArgs) -> Result<()> {
    let span = logging::operation_span("list", "cli");
    let _guard = span.enter();

    let mut filter = Filter::from(config.discovery.filter.clone());
    filter.merge(&args.to_filter()?);
    tracing::debug!(?filter, pick = ?args.pick, "Searching for devices");

    let discovery = coolant_devices::find_devices(args.pick, filter)?;

    if args.json {
        let (found, failure) = drain(discovery);
        println!("{}", serde_json::to_string_pretty(&found)?);
        return match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        };
    }

    let first = args.pick.unwrap_or(0);
    for (n, device) in discovery.enumerate() {
        let device = device?;
        print!("{}", render(first + n, device.info(), args.verbose));
    }
    Ok(())
}

/// Info of every device yielded before the first error
fn drain<I>(devices: I) -> (Vec<DriverInfo>, Option<DeviceError>)
where
    I: IntoIterator<Item = coolant_devices::Result<Box<dyn Driver>>>,
{
    let mut found = Vec::new();
    for device in devices {
        match device {
            Ok(device) => found.push(device.info().clone()),
            Err(e) => return (found, Some(e)),
        }
    }
    (found, None)
}

fn render(index: usize, info: &DriverInfo, verbose: bool) -> String {
    let mut out = format!("Device #{}: {}\n", index, info.description);
    if !verbose {
        return out;
    }

    let mut field = |name: &str, value: String| {
        out.push_str(&format!("├── {:<15} {}\n", name, value));
    };
    field("Driver", info.driver.clone());
    field("Vendor ID", format!("{:#06x}", info.vendor_id));
    field("Product ID", format!("{:#06x}", info.product_id));
    if let Some(release) = info.release_number {
        field("Release number", format!("{:#06x}", release));
    }
    if let Some(serial) = &info.serial_number {
        field("Serial number", serial.clone());
    }
    field("Bus", info.bus.clone());
    field("Address", info.address.clone());
    if let Some(port) = &info.port {
        field("Port", port.clone());
    }
    let capabilities: Vec<String> = info.capabilities.iter().map(|c| c.to_string()).collect();
    out.push_str(&format!("└── {:<15} {}\n\n", "Capabilities", capabilities.join(", ")));
    out
}

fn buses() -> Result<()> {
    for (name, description) in coolant_devices::available_buses()? {
        println!("{:<8} {}", name, description);
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {:#}", err);

    if let Some(DeviceError::Transport { bus, .. }) = err.downcast_ref::<DeviceError>() {
        eprintln!(
            "hint: check that the kernel driver for the {} bus is loaded and that you may read its devices; \
             --bus skips the other buses",
            bus
        );
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DeviceError>() {
        Some(DeviceError::Transport { .. }) => EXIT_TRANSPORT,
        Some(DeviceError::MalformedFilter(_)) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coolant_devices::drivers::FamilyDriver;
    use coolant_devices::DeviceHandle;

    fn parse(args: &[&str]) -> ListArgs {
        let mut argv = vec!["coolant", "list"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::List(args) => args,
            _ => panic!("expected the list command"),
        }
    }

    #[test]
    fn test_named_options_become_criteria() {
        let filter = parse(&["--vendor", "0x1e71", "--match", "Kraken", "--unsafe", "smbus"])
            .to_filter()
            .unwrap();

        assert_eq!(filter.vendor().unwrap(), Some(0x1e71));
        assert_eq!(filter.description_match().unwrap().as_deref(), Some("kraken"));
        assert_eq!(filter.unsafe_features().unwrap(), vec!["smbus"]);
        assert!(!filter.contains(filter::SERIAL));
    }

    #[test]
    fn test_extra_criteria() {
        let filter = parse(&["--filter", "speed=50", "--filter", "color=red"])
            .to_filter()
            .unwrap();

        assert_eq!(filter.get("speed"), Some(&Value::Integer(50)));
        assert_eq!(filter.get("color"), Some(&Value::from("red")));

        assert!(parse(&["--filter", "speed"]).to_filter().is_err());
    }

    #[test]
    fn test_pick_and_output_flags() {
        let args = parse(&["--pick", "2", "--json", "-v"]);
        assert_eq!(args.pick, Some(2));
        assert!(args.json);
        assert!(args.verbose);
    }

    #[test]
    fn test_exit_status() {
        let transport = anyhow::Error::from(DeviceError::transport_msg("hid", "hidraw devices not found"));
        assert_eq!(exit_status(&transport), EXIT_TRANSPORT);

        let malformed = anyhow::Error::from(DeviceError::malformed_filter("vendor must be a 16-bit id"));
        assert_eq!(exit_status(&malformed), EXIT_USAGE);

        assert_eq!(exit_status(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }

    #[test]
    fn test_legacy_flag() {
        let filter = parse(&["--legacy-690lc"]).to_filter().unwrap();
        assert!(filter.legacy_690lc().unwrap());

        let filter = parse(&[]).to_filter().unwrap();
        assert!(!filter.contains(filter::LEGACY_690LC));
    }

    #[test]
    fn test_drain_keeps_devices_before_an_error() {
        let device = |n: u32| -> coolant_devices::Result<Box<dyn Driver>> {
            let mut info = sample_info();
            info.address = format!("/dev/hidraw{}", n);
            Ok(Box::new(FamilyDriver::new(info, DeviceHandle::new("/dev/null"))) as Box<dyn Driver>)
        };
        let stream = vec![
            device(0),
            device(1),
            Err(DeviceError::transport_msg("usb", "USB devices not found")),
            device(2),
        ];

        let (found, failure) = drain(stream);
        let addresses: Vec<&str> = found.iter().map(|info| info.address.as_str()).collect();
        assert_eq!(addresses, vec!["/dev/hidraw0", "/dev/hidraw1"]);
        assert!(failure.unwrap().is_transport());

        let (found, failure) = drain(vec![device(0)]);
        assert_eq!(found.len(), 1);
        assert!(failure.is_none());
    }

    fn sample_info() -> DriverInfo {
        DriverInfo {
            description: "NZXT Smart Device V2".to_string(),
            driver: "smart_device".to_string(),
            vendor_id: 0x1e71,
            product_id: 0x2006,
            release_number: None,
            serial_number: Some("ABC".to_string()),
            bus: "hid".to_string(),
            address: "/dev/hidraw3".to_string(),
            port: Some("5".to_string()),
            capabilities: vec![],
        }
    }

    #[test]
    fn test_render() {
        let info = sample_info();

        assert_eq!(render(1, &info, false), "Device #1: NZXT Smart Device V2\n");

        let verbose = render(1, &info, true);
        assert!(verbose.contains("Vendor ID       0x1e71"));
        assert!(verbose.contains("Serial number   ABC"));
        assert!(!verbose.contains("Release number"));
    }
}
