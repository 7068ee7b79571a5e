use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ev3_lib::{Brick, BrickConfig, BrickSnapshot, ConnectionType, InputPort, LedPattern, OutputPort};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Drive a LEGO EV3 brick over USB, Bluetooth or Wi-Fi.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Link to use: usb, bluetooth or network.
    #[arg(short, long, default_value = "usb")]
    connection: ConnectionType,
    /// Serial port name for Bluetooth, host or host:port for network.
    #[arg(short, long)]
    target: Option<String>,
    /// Polling interval in milliseconds. 0 disables polling.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the firmware version and what is plugged into each port.
    Info,
    /// Print the port table every time it changes, until Ctrl+C.
    Watch {
        /// One JSON document per change instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run motors at a power for a while, then stop.
    Motor {
        /// Output ports, e.g. "A", "BC" or "all".
        #[arg(default_value = "all")]
        ports: OutputPort,
        #[arg(short, long, default_value_t = 50, allow_hyphen_values = true)]
        power: i32,
        #[arg(short = 'm', long, default_value_t = 1000)]
        time_ms: u32,
        /// Hold position afterwards instead of coasting.
        #[arg(short, long)]
        brake: bool,
    },
    /// Play a tone.
    Tone {
        #[arg(short, long, default_value_t = 440)]
        frequency: u16,
        #[arg(short, long, default_value_t = 500)]
        duration_ms: u16,
        #[arg(long, default_value_t = 50)]
        volume: i32,
    },
    /// Set the status light pattern.
    Led { pattern: Led },
    /// Copy a local file onto the brick.
    Upload { local: PathBuf, remote: String },
    /// Delete a file or empty directory on the brick.
    Rm { remote: String },
    /// Create a directory on the brick.
    Mkdir { remote: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Led {
    Off,
    Green,
    Red,
    Orange,
    GreenFlash,
    RedFlash,
    OrangeFlash,
    GreenPulse,
    RedPulse,
    OrangePulse,
}

impl From<Led> for LedPattern {
    fn from(led: Led) -> Self {
        match led {
            Led::Off => LedPattern::Black,
            Led::Green => LedPattern::Green,
            Led::Red => LedPattern::Red,
            Led::Orange => LedPattern::Orange,
            Led::GreenFlash => LedPattern::GreenFlash,
            Led::RedFlash => LedPattern::RedFlash,
            Led::OrangeFlash => LedPattern::OrangeFlash,
            Led::GreenPulse => LedPattern::GreenPulse,
            Led::RedPulse => LedPattern::RedPulse,
            Led::OrangePulse => LedPattern::OrangePulse,
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {path:?}"))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {path:?}");
    }
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let config = BrickConfig::default().with_poll_interval(Duration::from_millis(cli.poll_ms));
    let brick = Brick::new(config);
    brick
        .connect(cli.connection, cli.target.as_deref())
        .await
        .with_context(|| format!("Failed to connect over {}", cli.connection))?;

    let result = run(&brick, cli.command).await;
    if let Err(e) = brick.disconnect().await {
        error!("Disconnect failed: {e}");
    }
    if let Err(e) = result {
        error!("{e:?}");
        process::exit(1);
    }
    Ok(())
}

async fn run(brick: &Brick, command: Command) -> Result<()> {
    match command {
        Command::Info => print_info(brick).await,
        Command::Watch { json } => watch(brick, json).await,
        Command::Motor {
            ports,
            power,
            time_ms,
            brake,
        } => {
            brick
                .direct()
                .turn_motor_at_power_for_time(ports, power, time_ms, brake)
                .await
                .context("Failed to start motors")?;
            tokio::time::sleep(Duration::from_millis(u64::from(time_ms))).await;
            Ok(())
        }
        Command::Tone {
            frequency,
            duration_ms,
            volume,
        } => {
            brick
                .direct()
                .play_tone(volume, frequency, duration_ms)
                .await
                .context("Failed to play tone")?;
            tokio::time::sleep(Duration::from_millis(u64::from(duration_ms))).await;
            Ok(())
        }
        Command::Led { pattern } => Ok(brick.direct().set_led_pattern(pattern.into()).await?),
        Command::Upload { local, remote } => {
            brick
                .system()
                .copy_file(&local, &remote)
                .await
                .with_context(|| format!("Failed to upload {local:?} to {remote}"))?;
            println!("Uploaded {} to {remote}", local.display());
            Ok(())
        }
        Command::Rm { remote } => {
            brick
                .system()
                .delete_file(&remote)
                .await
                .with_context(|| format!("Failed to delete {remote}"))?;
            Ok(())
        }
        Command::Mkdir { remote } => {
            brick
                .system()
                .create_directory(&remote)
                .await
                .with_context(|| format!("Failed to create {remote}"))?;
            Ok(())
        }
    }
}

async fn print_info(brick: &Brick) -> Result<()> {
    let direct = brick.direct();
    let firmware = direct.get_firmware_version().await.context("Failed to read firmware version")?;
    println!("Firmware: {firmware}");

    for port in InputPort::ALL {
        let (device_type, mode) = direct.get_type_mode(port).await?;
        let name = direct.get_device_name(port).await.unwrap_or_default();
        println!("  Port {port}: {device_type} (mode {mode}) {name}");
    }
    Ok(())
}

fn print_snapshot(snapshot: &BrickSnapshot, json: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize snapshot: {e}"),
        }
        return;
    }
    for port in &snapshot.ports {
        println!(
            "  {:<4} {:<16} si {:>10.3}  raw {:>8}  pct {:>3}",
            port.input_port.to_string(),
            port.device_type.to_string(),
            port.si_value,
            port.raw_value,
            port.percent_value
        );
    }
    println!("  buttons: {:?}", snapshot.buttons);
}

async fn watch(brick: &Brick, json: bool) -> Result<()> {
    if !brick.is_polling() {
        anyhow::bail!("Polling is disabled, rerun with --poll-ms above 0");
    }
    print_snapshot(&brick.snapshot(), json);
    let id = brick.subscribe(move |snapshot| print_snapshot(snapshot, json));

    signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down gracefully.");
    brick.unsubscribe(id);
    Ok(())
}
