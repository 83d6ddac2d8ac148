//! Emulator configuration
//!
//! Loaded from a TOML file, or from the `device.toml` compiled into the
//! binary when no file is given. Command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use slidr_link::LinkConfig;

/// Default configuration embedded at compile time
pub const EMBEDDED_CONFIG: &str = include_str!("../device.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmuConfig {
    /// Serial device path
    pub port: String,
    pub link: LinkConfig,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            link: LinkConfig::default(),
        }
    }
}

impl EmuConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from `path`, or the embedded default when `None`
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let config = Self::parse(&text)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                let config = Self::parse(EMBEDDED_CONFIG).context("Embedded device.toml is invalid")?;
                info!("Using embedded configuration");
                Ok(config)
            }
        }
    }

    /// Apply command-line overrides
    pub fn apply_overrides(
        &mut self,
        port: Option<String>,
        root: Option<PathBuf>,
        baud: Option<u32>,
    ) {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(root) = root {
            self.link.storage_root = root;
        }
        if let Some(baud) = baud {
            self.link.uart.baudrate = baud;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidr_link::transport::{Parity, StopBits};

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = EmuConfig::parse(EMBEDDED_CONFIG).unwrap();
        assert_eq!(config, EmuConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = EmuConfig::parse(
            r#"
            port = "/dev/ttyUSB1"

            [link.uart]
            baudrate = 921600
            parity = "even"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.link.uart.baudrate, 921600);
        assert_eq!(config.link.uart.parity, Parity::Even);
        assert_eq!(config.link.uart.stop_bits, StopBits::One);
        assert_eq!(config.link.chunk_size, 512);
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        assert!(EmuConfig::parse("[link.uart]\nparity = \"mark\"\n").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = EmuConfig::default();
        config.apply_overrides(Some("COM3".into()), Some("/tmp/flash".into()), None);
        assert_eq!(config.port, "COM3");
        assert_eq!(config.link.storage_root, PathBuf::from("/tmp/flash"));
        assert_eq!(config.link.uart.baudrate, 115200);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("emu.toml");
        fs::write(&path, "port = \"/dev/null\"\n").unwrap();

        let config = EmuConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, "/dev/null");
        assert!(EmuConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
