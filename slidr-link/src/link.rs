//! Outbound packet writer
//!
//! One [`Link`] is cloned into every unit of execution that talks to the
//! host (receiver, image sender, transfer watchdog). Each packet is encoded
//! and written under one lock, so frames from different threads never
//! interleave on the wire.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use log::{trace, warn};
use slidr_protocol::{Command, ErrorCode, Packet};

use crate::transport::UartTx;

/// Shared handle to the transmit half of the serial port
#[derive(Clone)]
pub struct Link {
    tx: Arc<Mutex<Box<dyn UartTx + Send>>>,
}

impl Link {
    pub fn new<T: UartTx + Send + 'static>(tx: T) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Box::new(tx))),
        }
    }

    /// Encode and write one packet
    pub fn send(&self, packet: &Packet) -> io::Result<()> {
        let mut buf = vec![0u8; packet.encoded_len()];
        let len = packet
            .encode(&mut buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e:?}")))?;

        let mut tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        tx.write_blocking(&buf[..len])?;
        tx.flush()?;
        trace!("TX: cmd 0x{:02X}, {} bytes", packet.cmd, packet.payload.len());
        Ok(())
    }

    /// Send a packet, logging instead of propagating transport errors
    pub fn reply(&self, packet: &Packet) {
        if let Err(e) = self.send(packet) {
            warn!("Failed to send cmd 0x{:02X}: {}", packet.cmd, e);
        }
    }

    /// Build and send a packet from a command and payload
    pub fn send_packet(&self, cmd: Command, payload: &[u8]) {
        match Packet::new(cmd, payload) {
            Ok(packet) => self.reply(&packet),
            Err(e) => warn!("Cannot build {:?} packet: {:?}", cmd, e),
        }
    }

    pub fn send_ack(&self) {
        self.reply(&Packet::ack());
    }

    /// `ERROR_CMD([code])`
    pub fn send_error(&self, code: ErrorCode) {
        self.reply(&Packet::error(code));
    }

    /// `LOG_MESSAGE(text)`
    pub fn send_log(&self, text: &str) {
        self.reply(&Packet::log(text));
    }
}
