//! Connection health
//!
//! Records when the last checksum-valid packet arrived. The sleep policy
//! lives with the caller; this only exposes the timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct LinkHealth {
    epoch: Instant,
    /// Milliseconds since `epoch` of the last packet
    last_packet_ms: AtomicU64,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkHealth {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_packet_ms: AtomicU64::new(0),
        }
    }

    /// Milliseconds since the engine started, wrapping into the framer's clock
    pub fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    pub fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_packet_ms.store(now, Ordering::Relaxed);
    }

    /// Milliseconds since start at which the last packet arrived
    pub fn last_packet_ms(&self) -> u64 {
        self.last_packet_ms.load(Ordering::Relaxed)
    }

    /// Time since the last packet, or since start if none arrived yet
    pub fn last_packet_elapsed(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_packet_ms()))
    }
}
