//! Receive loop
//!
//! The only reader of the transport and the only owner of the framer.
//! Each poll first expires a stale partial frame, then drains whatever the
//! port has buffered and dispatches every complete packet in order.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, trace};
use slidr_protocol::Framer;

use crate::dispatcher::{CommandHandler, Dispatcher};
use crate::health::LinkHealth;
use crate::transport::UartRx;

/// Buffer size for one transport read
const RX_BUF_SIZE: usize = 256;

pub struct Receiver<R, H> {
    rx: R,
    framer: Framer,
    dispatcher: Dispatcher<H>,
    health: Arc<LinkHealth>,
}

impl<R: UartRx, H: CommandHandler> Receiver<R, H> {
    pub fn new(rx: R, framer: Framer, dispatcher: Dispatcher<H>, health: Arc<LinkHealth>) -> Self {
        Self {
            rx,
            framer,
            dispatcher,
            health,
        }
    }

    /// One receive step
    ///
    /// Returns the number of bytes drained from the transport.
    pub fn poll(&mut self) -> io::Result<usize> {
        if let Err(e) = self.framer.tick(self.health.now_ms()) {
            self.dispatcher.report_frame_error(&e);
        }

        let mut buf = [0u8; RX_BUF_SIZE];
        let mut total = 0;
        loop {
            let n = self.rx.read_available(&mut buf)?;
            if n == 0 {
                break;
            }
            trace!("RX: {} bytes", n);
            total += n;

            for &byte in &buf[..n] {
                match self.framer.feed(byte, self.health.now_ms()) {
                    Ok(Some(packet)) => {
                        self.health.touch();
                        self.dispatcher.dispatch(&packet);
                    }
                    Ok(None) => {}
                    Err(e) => self.dispatcher.report_frame_error(&e),
                }
            }
        }
        Ok(total)
    }

    /// Poll until `stop` is raised, sleeping `interval` between polls
    pub fn run(mut self, stop: &AtomicBool, interval: Duration) {
        info!("Receiver started");

        while !stop.load(Ordering::SeqCst) {
            if let Err(e) = self.poll() {
                error!("Serial read error: {}", e);
            }
            thread::sleep(interval);
        }

        info!("Receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::link::Link;
    use crate::transfer::FileTransfer;
    use crate::transport::{memory_port, HostPort, MemoryRx};
    use slidr_protocol::{Command, ErrorCode, Packet, FRAME_START};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_millis(200);

    struct Pong;

    impl CommandHandler for Pong {
        fn handle(&mut self, packet: &Packet, link: &Link) -> bool {
            if packet.command() == Some(Command::Ping) {
                link.send_packet(Command::Pong, &[]);
                return true;
            }
            false
        }
    }

    fn setup(timeout_ms: u32) -> (Receiver<MemoryRx, Pong>, HostPort, TempDir) {
        let dir = TempDir::new().unwrap();
        let (rx, tx, host) = memory_port();
        let link = Link::new(tx);
        let config = LinkConfig {
            storage_root: dir.path().to_path_buf(),
            ..LinkConfig::default()
        };
        let transfer = FileTransfer::new(link.clone(), &config);
        let receiver = Receiver::new(
            rx,
            Framer::with_timeout(timeout_ms),
            Dispatcher::new(transfer, link, Pong),
            Arc::new(LinkHealth::new()),
        );
        (receiver, host, dir)
    }

    #[test]
    fn test_packets_dispatched_in_order() {
        let (mut receiver, mut host, _dir) = setup(1000);

        host.send_raw(&[0x00, 0x13]);
        host.send_command(Command::Ping, &[]);
        host.send_command(Command::GetStatus, &[]);
        host.send_command(Command::Ping, &[]);

        let drained = receiver.poll().unwrap();
        assert_eq!(drained, 2 + 3 * 5);

        assert_eq!(host.recv(WAIT), Some(Packet::empty(Command::Pong)));
        assert_eq!(
            host.recv(WAIT),
            Some(Packet::error(ErrorCode::InvalidCommand))
        );
        assert_eq!(host.recv(WAIT), Some(Packet::empty(Command::Pong)));
    }

    #[test]
    fn test_health_touched_on_valid_packet() {
        let (mut receiver, host, _dir) = setup(1000);
        thread::sleep(Duration::from_millis(30));
        assert!(receiver.health.last_packet_elapsed() >= Duration::from_millis(30));

        host.send_command(Command::Ping, &[]);
        receiver.poll().unwrap();
        assert!(receiver.health.last_packet_elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn test_stale_partial_frame_expires() {
        let (mut receiver, mut host, _dir) = setup(50);

        host.send_raw(&[FRAME_START, 0x01, 0x04]);
        receiver.poll().unwrap();
        thread::sleep(Duration::from_millis(80));
        receiver.poll().unwrap();

        let log = host.recv(WAIT).unwrap();
        assert_eq!(log.command(), Some(Command::LogMessage));
        assert_eq!(log.payload.as_slice(), b"Packet timeout");

        // Parser is idle again
        host.send_command(Command::Ping, &[]);
        receiver.poll().unwrap();
        assert_eq!(host.recv(WAIT), Some(Packet::empty(Command::Pong)));
    }
}
