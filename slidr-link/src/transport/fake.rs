//! In-memory serial port for tests and simulations
//!
//! [`memory_port`] returns the device halves (to hand to the engine) and a
//! [`HostPort`] that plays the host application: it writes frames into the
//! device's receive queue and parses whatever the device transmits.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use slidr_protocol::{Command, Framer, Packet};

use super::{UartRx, UartTx};

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// Create a connected device/host pair
pub fn memory_port() -> (MemoryRx, MemoryTx, HostPort) {
    let to_device: Pipe = Arc::default();
    let to_host: Pipe = Arc::default();

    (
        MemoryRx {
            pipe: to_device.clone(),
        },
        MemoryTx {
            pipe: to_host.clone(),
        },
        HostPort {
            to_device,
            to_host,
            framer: Framer::new(),
            epoch: Instant::now(),
        },
    )
}

/// Device receive half
pub struct MemoryRx {
    pipe: Pipe,
}

impl UartRx for MemoryRx {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.pipe.lock().unwrap_or_else(PoisonError::into_inner);
        let n = buf.len().min(pipe.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Device transmit half
pub struct MemoryTx {
    pipe: Pipe,
}

impl UartTx for MemoryTx {
    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        self.pipe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(data.iter().copied());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Host side of a [`memory_port`]
pub struct HostPort {
    to_device: Pipe,
    to_host: Pipe,
    framer: Framer,
    epoch: Instant,
}

impl HostPort {
    /// Queue raw bytes for the device
    pub fn send_raw(&self, bytes: &[u8]) {
        self.to_device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(bytes.iter().copied());
    }

    /// Encode and queue a packet for the device
    pub fn send(&self, packet: &Packet) {
        let mut buf = vec![0u8; packet.encoded_len()];
        if let Ok(len) = packet.encode(&mut buf) {
            self.send_raw(&buf[..len]);
        }
    }

    pub fn send_command(&self, cmd: Command, payload: &[u8]) {
        if let Ok(packet) = Packet::new(cmd, payload) {
            self.send(&packet);
        }
    }

    /// Wait for the next packet from the device
    ///
    /// Framing errors on the host side are skipped.
    pub fn recv(&mut self, timeout: Duration) -> Option<Packet> {
        let deadline = Instant::now() + timeout;
        loop {
            let byte = self
                .to_host
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();

            match byte {
                Some(byte) => {
                    let now_ms = self.epoch.elapsed().as_millis() as u32;
                    if let Ok(Some(packet)) = self.framer.feed(byte, now_ms) {
                        return Some(packet);
                    }
                }
                None => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// Like [`recv`](Self::recv) but skips `LOG_MESSAGE` packets
    pub fn recv_reply(&mut self, timeout: Duration) -> Option<Packet> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let packet = self.recv(left)?;
            if packet.command() != Some(Command::LogMessage) {
                return Some(packet);
            }
        }
    }

    /// Collect every packet that arrives until the line stays quiet for `quiet`
    pub fn collect(&mut self, quiet: Duration) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = self.recv(quiet) {
            packets.push(packet);
        }
        packets
    }

    /// Bytes the device has written that were not yet consumed
    pub fn pending(&self) -> usize {
        self.to_host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
