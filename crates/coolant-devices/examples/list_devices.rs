use coolant_devices::{filter, find_devices, Driver, Filter};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    coolant_devices::init()?;

    // Everything NZXT, then just the first match
    let nzxt = Filter::new().with(filter::VENDOR, 0x1e71);
    for device in find_devices(None, nzxt.clone())? {
        let device = device?;
        println!("{} ({})", device.description(), device.info().address);
    }

    if let Some(device) = find_devices(Some(0), nzxt)?.next() {
        let mut device = device?;
        device.connect()?;
        info!("Connected to {}", device.description());
        device.disconnect()?;
    }

    Ok(())
}
