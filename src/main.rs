use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;

use pulsebus::bridge::ControllerBridge;
use pulsebus::config::Config;
use pulsebus::error::AppResult;
use pulsebus::headband::{GyroRecording, HeadMovement, MODES};
use pulsebus::heart::{ExcitementMonitor, HeartMonitor, HeartSource};
use pulsebus::messaging::{Message, MessageKind};
use pulsebus::runtime::{App, HubId, RetryPolicy};
use pulsebus::signal::{CalibrationStore, FileStore};

const LOG_TARGET_STARTUP: &str = "pulsebus::startup";

/// Frames per `GyroSamples` message when replaying a recording
const GYRO_BATCH: usize = 12;

/// Component bus for heart-rate and headband biofeedback
#[derive(Parser, Debug)]
#[command(name = "pulsebus")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Unix socket of a controlling parent process
    #[arg(long, global = true, env = "PULSEBUS_CONTROLLER")]
    controller: Option<PathBuf>,

    /// Address of the haptics server
    #[arg(long, global = true)]
    iface: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the excitement detector on a heart-rate socket or replay file
    Heart {
        /// `.socket` for a live monitor, anything else is replayed
        path: PathBuf,

        /// Only print the final result
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run the gyro detectors on a recording (`-` for stdin)
    Gyro {
        input: PathBuf,

        #[arg(long, default_value = "yesno")]
        mode: String,

        /// Where per-axis calibration is stored
        #[arg(long)]
        calibration_dir: Option<PathBuf>,
    },

    /// List available component kinds and gyro modes
    List,
}

/// Initialize tracing with file rotation
///
/// Logs go to `<config dir>/pulsebus/logs/pulsebus.YYYY-MM-DD.log` and to
/// stderr. `RUST_LOG` overrides the level.
fn initialize_tracing(debug: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .with_target(false);

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("pulsebus").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    // Without a log directory only the console layer is installed
    let (file_layer, guard, dir_error) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&log_dir, "pulsebus.log"));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    match dir_error {
        None => tracing::debug!("Log directory: {}", log_dir.display()),
        Some(e) => tracing::warn!("Failed to create log directory {}: {}", log_dir.display(), e),
    }
    guard
}

fn log_runtime_environment() {
    let mut system = System::new();
    system.refresh_cpu();

    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());

    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Starting pulsebus v{} on {} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        os_name
    );
    tracing::debug!(
        target: LOG_TARGET_STARTUP,
        "Kernel {}, {} CPUs",
        kernel,
        system.cpus().len()
    );
}

fn main() -> AppResult<()> {
    let args = Args::parse();
    let _log_guard = initialize_tracing(args.debug);
    log_runtime_environment();

    let mut config = Config::load(args.config.as_deref())?;
    if args.controller.is_some() {
        config.controller = args.controller.clone();
    }
    if args.iface.is_some() {
        config.haptics_iface = args.iface.clone();
    }
    if let Some(iface) = &config.haptics_iface {
        tracing::info!("Haptics server: {}", iface);
    }

    match args.command {
        Command::Heart { path, quiet } => run_heart(&config, &path, quiet),
        Command::Gyro {
            input,
            mode,
            calibration_dir,
        } => {
            if let Some(dir) = calibration_dir {
                config.gyro.calibration_dir = dir;
            }
            run_gyro(&config, &input, &mode)
        }
        Command::List => {
            for (kind, description) in pulsebus::builtin_registry().kinds() {
                println!("{:<14} {}", kind, description);
            }
            println!();
            for (mode, description) in MODES {
                println!("gyro mode {:<8} {}", mode, description);
            }
            Ok(())
        }
    }
}

/// Add the controller bridge if a parent process asked for one
fn attach_controller(app: &App, hub: HubId, config: &Config) -> AppResult<()> {
    if let Some(path) = &config.controller {
        let bridge = ControllerBridge::new(
            "controller",
            path.clone(),
            RetryPolicy::fixed(config.retry_backoff()),
            config.call_timeout(),
        );
        app.add_component(hub, Box::new(bridge))?;
    }
    Ok(())
}

fn run_heart(config: &Config, path: &Path, quiet: bool) -> AppResult<()> {
    let app = App::new();
    let (events, _tap) = app.subscribe();

    let inputs = app.add_hub("inputs")?;
    let main = app.add_hub("main")?;
    attach_controller(&app, main, config)?;

    app.add_component(main, Box::new(ExcitementMonitor::new("excitement", &config.excitement)))?;
    let source = HeartSource::from_path(path);
    app.add_component(
        inputs,
        Box::new(HeartMonitor::new("heart", source, RetryPolicy::fixed(config.retry_backoff()))),
    )?;

    for message in events.iter() {
        match message.kind() {
            MessageKind::ExcitementChanged { .. } if !quiet => println!("{}", message.description()),
            MessageKind::ComponentStopped { name } if name == "heart" => break,
            _ => {}
        }
    }

    let state = app.call("excitement", "state", vec![], config.call_timeout())?;
    let spans = app.call("excitement", "hspans", vec![], config.call_timeout())?;
    println!("Final state: {}", state.as_str().unwrap_or("unknown"));
    if let Value::Array(spans) = spans {
        for span in spans {
            println!(
                "Excited from {} ({} bpm) to {} ({} bpm)",
                span["start"], span["start_rate"], span["end"], span["end_rate"]
            );
        }
    }

    app.shutdown();
    Ok(())
}

fn run_gyro(config: &Config, input: &Path, mode: &str) -> AppResult<()> {
    let recording = if input == Path::new("-") {
        GyroRecording::read(io::stdin().lock())?
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("Failed to open gyro recording {}", input.display()))?;
        GyroRecording::read(BufReader::new(file))?
    };
    tracing::info!("Replaying {} gyro frames in {} mode", recording.len(), mode);

    let app = App::new();
    let (events, _tap) = app.subscribe();
    let main = app.add_hub("main")?;
    attach_controller(&app, main, config)?;

    let store: Arc<dyn CalibrationStore> = Arc::new(FileStore::new(config.gyro.calibration_dir.clone()));
    let movement = HeadMovement::new("head", mode, config.gyro.clone(), store)?;
    app.add_component(main, Box::new(movement))?;
    app.broadcast(Message::new(MessageKind::SetActive { active: true }).to("head"));

    for (samples, timestamps) in recording.batches(GYRO_BATCH) {
        app.broadcast(MessageKind::GyroSamples {
            samples: samples.to_vec(),
            timestamps: timestamps.to_vec(),
        });
    }

    // Calls queue behind the samples, so every event is published once this returns
    app.call("head", "mode", vec![], Duration::from_secs(30))?;

    for message in events.try_iter() {
        if matches!(
            message.kind(),
            MessageKind::HeadShaken { .. } | MessageKind::HeadYesNo { .. } | MessageKind::HeadGyro { .. }
        ) {
            println!("{}", message.description());
        }
    }

    app.shutdown();
    Ok(())
}
