//! Packet dispatcher
//!
//! Routes every validated packet: the transfer state machine gets the first
//! look, everything it leaves goes to the device's [`CommandHandler`].
//! Framing errors are turned into `LOG_MESSAGE` / `ERROR_CMD` here as well.

use std::path::Path;

use log::{debug, warn};
use slidr_protocol::{Command, ErrorCode, FrameError, Packet};

use crate::link::Link;
use crate::transfer::{Claim, FileTransfer};

/// Device-side handler for non-transfer commands
pub trait CommandHandler: Send {
    /// Handle one packet
    ///
    /// Replies go out through `link`. Return false for commands the handler
    /// does not implement; the dispatcher then answers `INVALID_COMMAND`.
    fn handle(&mut self, packet: &Packet, link: &Link) -> bool;

    /// An uploaded image was stored at `path`
    fn file_received(&mut self, _path: &Path) {}
}

pub struct Dispatcher<H> {
    transfer: FileTransfer,
    link: Link,
    handler: H,
}

impl<H: CommandHandler> Dispatcher<H> {
    pub fn new(transfer: FileTransfer, link: Link, handler: H) -> Self {
        Self {
            transfer,
            link,
            handler,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn dispatch(&mut self, packet: &Packet) {
        debug!(
            "RX: cmd 0x{:02X}, {} bytes",
            packet.cmd,
            packet.payload.len()
        );

        match self.transfer.try_handle(packet) {
            Claim::Claimed => return,
            Claim::FileReceived(path) => {
                self.handler.file_received(&path);
                return;
            }
            Claim::Unclaimed => {}
        }

        match packet.command() {
            None => {
                warn!("Unknown command 0x{:02X}", packet.cmd);
                self.send_log(&format!("Unknown command: 0x{:02X}", packet.cmd));
                self.send_error(ErrorCode::InvalidCommand);
            }
            Some(Command::ChangeBaudrate) => {
                self.send_log("Baudrate change not supported");
                self.send_error(ErrorCode::InvalidCommand);
            }
            Some(cmd) => {
                if !self.handler.handle(packet, &self.link) {
                    debug!("Unhandled command {:?}", cmd);
                    self.send_error(ErrorCode::InvalidCommand);
                }
            }
        }
    }

    /// Report a discarded frame to the host
    pub fn report_frame_error(&self, err: &FrameError) {
        let text = match err {
            FrameError::Timeout => "Packet timeout".to_string(),
            FrameError::Overflow { declared } => format!("Packet size overflow: {}", declared),
            FrameError::InvalidChecksum {
                received,
                calculated,
            } => format!(
                "Checksum mismatch (RX: 0x{:02X}, CALC: 0x{:02X})",
                received, calculated
            ),
            other => format!("Frame error: {:?}", other),
        };

        warn!("{}", text);
        self.send_log(&text);
        if let Some(code) = err.code() {
            self.send_error(code);
        }
    }

    pub fn send_error(&self, code: ErrorCode) {
        self.link.send_error(code);
    }

    pub fn send_log(&self, text: &str) {
        self.link.send_log(text);
    }
}
