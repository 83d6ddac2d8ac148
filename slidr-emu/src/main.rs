//! SlidR device emulator
//!
//! Runs the device side of the SlidR protocol on a host serial port, with a
//! directory standing in for the device's flash filesystem.

mod config;
mod controller;
mod serial;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;
use slidr_link::Engine;

use crate::config::EmuConfig;
use crate::controller::Controller;

/// How often the idle policy is evaluated
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// SlidR device emulator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (TOML). Defaults to the embedded device.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port to serve, e.g. /dev/ttyACM0 or COM3
    #[arg(short, long)]
    port: Option<String>,

    /// Directory used as the device filesystem
    #[arg(long)]
    root: Option<PathBuf>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Verbosity level (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = EmuConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.port, args.root, args.baud);

    let (rx, tx) = serial::open(&config.port, &config.link.uart)
        .with_context(|| format!("Failed to open serial port {}", config.port))?;
    info!(
        "Serving {} at {} baud",
        config.port, config.link.uart.baudrate
    );

    std::fs::create_dir_all(&config.link.storage_root).with_context(|| {
        format!(
            "Failed to create storage root {}",
            config.link.storage_root.display()
        )
    })?;
    let controller = Controller::load(&config.link.storage_root);

    let engine = Engine::start(&config.link, rx, tx, controller.clone())
        .context("Failed to start engine")?;

    loop {
        thread::sleep(IDLE_CHECK_INTERVAL);
        controller.check_idle(engine.last_packet_elapsed());
    }
}
