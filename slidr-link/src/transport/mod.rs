//! Serial transport abstractions
//!
//! The engine talks to a byte stream through two halves so the receiver
//! thread can own the read side while the outbound [`Link`](crate::Link)
//! shares the write side between threads.

pub mod fake;

use std::io;

use serde::{Deserialize, Serialize};

pub use fake::{memory_port, HostPort, MemoryRx, MemoryTx};

/// Serial transmitter
pub trait UartTx {
    /// Write data to the port
    ///
    /// Blocks until all data has been written or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush any buffered data
    fn flush(&mut self) -> io::Result<()>;
}

/// Serial receiver
pub trait UartRx {
    /// Read whatever is currently available
    ///
    /// Returns `Ok(0)` when nothing arrived within the port's read timeout;
    /// the receiver treats that as "drained" rather than end of stream.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: UartTx + ?Sized> UartTx for Box<T> {
    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_blocking(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<T: UartRx + ?Sized> UartRx for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_available(buf)
    }
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Read timeout of the port in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: 1000,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}
