use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ev3_lib::transport::{bluetooth, usb};
use tokio_serial::SerialPortType;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Lists EV3 bricks on USB and the serial ports a Bluetooth brick may sit behind.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Also list serial ports that are not Bluetooth links.
    #[arg(short, long)]
    all_ports: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).without_time())
        .init();

    info!("Listing EV3 bricks on USB...");
    let bricks = usb::find_bricks().context("Failed to list USB devices")?;
    for (count, device_info) in bricks.iter().enumerate() {
        info!(
            "Brick #{}: Bus: {:03}, Address: {:03}, Serial: {}",
            count + 1,
            device_info.bus_number(),
            device_info.device_address(),
            device_info.serial_number().unwrap_or("<Not available>")
        );
    }
    if bricks.is_empty() {
        info!("No EV3 brick found on USB.");
    }

    info!("Listing serial ports...");
    match bluetooth::list_ports() {
        Ok(ports) => {
            let mut shown = 0;
            for port in ports {
                let is_bluetooth = matches!(port.port_type, SerialPortType::BluetoothPort);
                if !is_bluetooth && !cli.all_ports {
                    continue;
                }
                shown += 1;
                info!("  {} ({:?})", port.port_name, port.port_type);
            }
            if shown == 0 {
                info!("No Bluetooth serial ports found.");
            }
        }
        Err(e) => warn!("Error listing serial ports: {e}"),
    }
    Ok(())
}
