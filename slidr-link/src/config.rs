//! Engine configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slidr_protocol::{MAX_PAYLOAD_SIZE, PACKET_TIMEOUT_MS};

use crate::transport::UartConfig;

/// Default download chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Settings of one engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port settings
    pub uart: UartConfig,
    /// Inter-byte frame timeout, also the watchdog window and ACK wait
    pub packet_timeout_ms: u32,
    /// Bytes per `DOWNLOAD_IMAGE_DATA` packet
    pub chunk_size: usize,
    /// Sleep between receiver polls
    pub poll_interval_ms: u64,
    /// Directory holding `images/` and the upload temp file
    pub storage_root: PathBuf,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            uart: UartConfig::default(),
            packet_timeout_ms: PACKET_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval_ms: 10,
            storage_root: PathBuf::from("./flash"),
        }
    }
}

impl LinkConfig {
    pub fn packet_timeout(&self) -> Duration {
        Duration::from_millis(self.packet_timeout_ms as u64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Chunk size limited to what one packet can carry
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_PAYLOAD_SIZE)
    }
}
