//! Serial port adapter for the engine's transport traits

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use slidr_link::transport::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};

pub struct SerialRx {
    port: Box<dyn SerialPort>,
}

pub struct SerialTx {
    port: Box<dyn SerialPort>,
}

/// Open `path` and split it into receive and transmit halves
pub fn open(path: &str, config: &UartConfig) -> serialport::Result<(SerialRx, SerialTx)> {
    let port = serialport::new(path, config.baudrate)
        .data_bits(match config.data_bits {
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        })
        .parity(match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        })
        .stop_bits(match config.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        })
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open()?;

    let tx = port.try_clone()?;
    Ok((SerialRx { port }, SerialTx { port: tx }))
}

impl UartRx for SerialRx {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(0);
        }

        let len = available.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }
}

impl UartTx for SerialTx {
    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
