//! Device controller
//!
//! Handles every command the transfer state machine leaves alone: ping,
//! configuration, backlight and status. Owns the device configuration and
//! persists it as the versioned blob at `<root>/config.bin`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use slidr_link::{CommandHandler, Link, Storage};
use slidr_protocol::{Command, DeviceConfig, ErrorCode, Packet, SetBacklight, Status};

/// Idle time after which the device sleeps, when sleeping is enabled
pub const SLEEP_TIMEOUT: Duration = Duration::from_secs(10);

const CONFIG_FILE: &str = "config.bin";

/// Runtime state shared with the idle policy
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub config: DeviceConfig,
    pub awake: bool,
    pub backlight: u8,
    /// Segments whose image changed since the last redraw
    pub dirty_segments: Vec<u8>,
}

#[derive(Clone)]
pub struct Controller {
    state: Arc<Mutex<DeviceState>>,
    storage: Storage,
    config_path: PathBuf,
}

impl Controller {
    /// Load the persisted configuration under `root`
    ///
    /// A missing or invalid blob is replaced by the defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        let config = match fs::read(&config_path) {
            Ok(bytes) => match DeviceConfig::from_bytes(&bytes) {
                Ok(config) => {
                    info!("Loaded device configuration");
                    Some(config)
                }
                Err(e) => {
                    warn!("Stored configuration invalid: {:?}, using defaults", e);
                    None
                }
            },
            Err(e) => {
                debug!("No stored configuration ({}), using defaults", e);
                None
            }
        };

        let stored = config.is_some();
        let config = config.unwrap_or_default();

        let controller = Self {
            state: Arc::new(Mutex::new(DeviceState {
                backlight: config.tft_backlight_value,
                config,
                awake: true,
                dirty_segments: Vec::new(),
            })),
            storage: Storage::new(root),
            config_path,
        };

        if !stored {
            if let Err(e) = controller.persist(&DeviceConfig::default()) {
                warn!("Failed to write default configuration: {}", e);
            }
        }
        controller
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the idle policy given the time since the last valid packet
    pub fn check_idle(&self, idle: Duration) {
        let mut state = self.state();
        if idle < SLEEP_TIMEOUT {
            if !state.awake {
                wake(&mut state);
            }
        } else if state.awake && state.config.do_sleep {
            info!("No activity for {} s, going to sleep", idle.as_secs());
            state.awake = false;
            state.backlight = 0;
        }
    }

    fn persist(&self, config: &DeviceConfig) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, config.to_bytes())
    }

    fn store_config(&self, config: DeviceConfig, link: &Link) {
        if let Err(e) = self.persist(&config) {
            warn!("Failed to save configuration: {}", e);
            link.send_log(&format!("Failed to save config: {}", e));
            link.send_error(ErrorCode::FileError);
            return;
        }

        let mut state = self.state();
        state.backlight = config.tft_backlight_value;
        state.config = config;
        drop(state);

        info!("Configuration updated");
        link.send_ack();
    }
}

fn wake(state: &mut DeviceState) {
    info!("Waking up");
    state.awake = true;
    state.backlight = state.config.tft_backlight_value;
}

impl CommandHandler for Controller {
    fn handle(&mut self, packet: &Packet, link: &Link) -> bool {
        {
            let mut state = self.state();
            if !state.awake {
                wake(&mut state);
            }
        }

        match packet.command() {
            Some(Command::Ping) => link.send_packet(Command::Pong, &[]),
            Some(Command::SetConfig) => match DeviceConfig::from_bytes(&packet.payload) {
                Ok(config) => self.store_config(config, link),
                Err(e) => {
                    warn!("Rejected configuration: {:?}", e);
                    link.send_log(&format!("Invalid config: {:?}", e));
                    link.send_error(ErrorCode::InvalidConfig);
                }
            },
            Some(Command::GetConfig) => {
                let blob = self.state().config.to_bytes();
                link.send_packet(Command::ConfigData, &blob);
            }
            Some(Command::DefaultConfig) => self.store_config(DeviceConfig::default(), link),
            Some(Command::SetBacklight) => match SetBacklight::from_payload(&packet.payload) {
                Ok(msg) => {
                    debug!("Backlight {}", msg.level);
                    self.state().backlight = msg.level;
                }
                Err(_) => link.send_error(ErrorCode::InvalidCommand),
            },
            Some(Command::GetStatus) => {
                let state = self.state();
                let status = Status {
                    awake: state.awake,
                    backlight: state.backlight,
                    segment_count: state.config.segments.len() as u8,
                };
                drop(state);
                match status.to_packet() {
                    Ok(reply) => link.reply(&reply),
                    Err(e) => warn!("Cannot build status: {:?}", e),
                }
            }
            _ => return false,
        }
        true
    }

    fn file_received(&mut self, path: &Path) {
        match self.storage.segment_for_path(path) {
            Some(segment) => {
                info!("Segment {} image updated", segment);
                let mut state = self.state();
                if !state.dirty_segments.contains(&segment) {
                    state.dirty_segments.push(segment);
                }
            }
            None => warn!("Stored file {} is not a segment image", path.display()),
        }
    }
}
