use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uom::si::f64::Length;
use uom::si::length::millimeter;

use lac_lib::units::Stroke;
use lac_lib::{Command, DeviceConfig, Lac};

/// Command-line control for the Actuonix USB Linear Actuator Control board.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
    #[command(subcommand)]
    action: Action,
}

/// Where to find the board and how to time exchanges with it.
#[derive(Args, Debug)]
struct DeviceArgs {
    /// JSON file with device settings (IDs, endpoints, timeouts).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// USB vendor ID, e.g. 0x04d8.
    #[arg(long, value_parser = parse_u16, global = true)]
    vid: Option<u16>,
    /// USB product ID, e.g. 0xfc5f.
    #[arg(long, value_parser = parse_u16, global = true)]
    pid: Option<u16>,
    /// Delay between writing a command and reading the reply, in milliseconds.
    #[arg(long, global = true)]
    settle_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List every command the board understands.
    Commands,
    /// Print the actual position, between 0-1023.
    GetPosition {
        /// Stroke in mm; also prints the position as a distance.
        #[arg(long)]
        stroke: Option<f64>,
    },
    /// Set the raw position (0-1023), or a distance with --mm and --stroke.
    SetPosition {
        #[arg(required_unless_present = "mm")]
        value: Option<u16>,
        /// Target distance from the retracted end, in mm.
        #[arg(long, requires = "stroke", conflicts_with = "value")]
        mm: Option<f64>,
        /// Stroke of the actuator in mm.
        #[arg(long)]
        stroke: Option<f64>,
    },
    /// Send any command by name, e.g. `set set_accuracy 4`.
    Set {
        command: Command,
        /// Required unless the command takes no argument.
        #[arg(allow_hyphen_values = true)]
        value: Option<i64>,
    },
    /// Send a raw opcode and value. Both are validated before anything is written.
    Raw {
        #[arg(value_parser = parse_u8)]
        opcode: u8,
        #[arg(allow_hyphen_values = true, default_value_t = 0)]
        value: i64,
    },
    /// Poll until the actuator is within tolerance of a raw target.
    Wait {
        target: u16,
        #[arg(short, long, default_value_t = 4)]
        tolerance: u16,
        /// Give up after this many milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
        /// Polling interval in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
    /// Save the configuration to EEPROM and disable the potentiometers.
    DisableManual,
    /// Restore factory settings and re-enable the potentiometers.
    Reset,
}

fn parse_int(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    u16::try_from(parse_int(s)?).map_err(|_| format!("'{s}' does not fit in 16 bits"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    u8::try_from(parse_int(s)?).map_err(|_| format!("'{s}' does not fit in 8 bits"))
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<WarnLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file =
            File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // WARN by default, INFO with -v, DEBUG (frames in hex) with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

impl DeviceArgs {
    fn load_config(&self) -> Result<DeviceConfig> {
        let mut config = match &self.config {
            Some(path) => read_config_file(path)?,
            None => DeviceConfig::default(),
        };
        if let Some(vid) = self.vid {
            config.vendor_id = vid;
        }
        if let Some(pid) = self.pid {
            config.product_id = pid;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
        Ok(config)
    }

    async fn connect(&self) -> Result<Lac> {
        let config = self.load_config()?;
        Lac::connect(config).await.context("Failed to open LAC board")
    }
}

fn read_config_file(path: &Path) -> Result<DeviceConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config file {:?}", path))
}

/// Value to send with `command`: commands without an argument always send 0.
fn command_value(command: Command, value: Option<i64>) -> Result<i64> {
    match (command.takes_argument(), value) {
        (true, Some(value)) => Ok(value),
        (true, None) => anyhow::bail!("{command} requires a value"),
        (false, None | Some(0)) => Ok(0),
        (false, Some(value)) => anyhow::bail!("{command} takes no argument, got {value}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("Command failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let device = &cli.device;

    match cli.action {
        Action::Commands => {
            for command in Command::ALL {
                println!("{:#04x}  {:<24} {}", command.opcode(), command.to_string(), command.summary());
            }
        }
        Action::GetPosition { stroke } => {
            let lac = device.connect().await?;
            let position = lac.get_feedback().await?;
            match stroke {
                Some(stroke) => {
                    let distance = Stroke::from_millimeters(stroke)?.raw_to_position(position);
                    println!("{} ({:.2} mm)", position, distance.get::<millimeter>());
                }
                None => println!("{}", position),
            }
        }
        Action::SetPosition { value, mm, stroke } => {
            let raw = match (value, mm, stroke) {
                (Some(value), _, _) => value,
                (None, Some(mm), Some(stroke)) => {
                    Stroke::from_millimeters(stroke)?.position_to_raw(Length::new::<millimeter>(mm))?
                }
                _ => anyhow::bail!("either a raw value or --mm with --stroke is required"),
            };
            let lac = device.connect().await?;
            let current = lac.set_position(raw).await?;
            info!(requested = raw, current, "Position set");
            println!("{}", current);
        }
        Action::Set { command, value } => {
            let value = command_value(command, value)?;
            let lac = device.connect().await?;
            let response = lac.execute_raw(command.opcode(), value).await?;
            println!("{:#04x} {}", response.mode(), response.payload());
        }
        Action::Raw { opcode, value } => {
            let lac = device.connect().await?;
            let response = lac.execute_raw(opcode, value).await?;
            println!("{:#04x} {}", response.mode(), response.payload());
        }
        Action::Wait {
            target,
            tolerance,
            timeout_ms,
            interval_ms,
        } => {
            let lac = device.connect().await?;
            let position = lac
                .wait_for_position(
                    target,
                    tolerance,
                    Duration::from_millis(interval_ms),
                    Duration::from_millis(timeout_ms),
                )
                .await?;
            println!("{}", position);
        }
        Action::DisableManual => {
            let lac = device.connect().await?;
            lac.disable_manual().await?;
            println!("Configuration saved, potentiometers disabled");
        }
        Action::Reset => {
            let lac = device.connect().await?;
            lac.reset().await?;
            println!("Factory configuration restored");
        }
    }

    Ok(())
}
