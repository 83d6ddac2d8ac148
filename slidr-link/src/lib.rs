//! SlidR device communication engine
//!
//! Runs the device side of the SlidR serial protocol on `std`:
//! - `receiver`: drains the transport and feeds the framer
//! - `dispatcher`: routes packets to the transfer state machine or the
//!   device's [`CommandHandler`]
//! - `transfer`: image upload/download sessions, one at a time
//! - `watchdog`: cancels a transfer that stops making progress
//!
//! ```no_run
//! use slidr_link::{CommandHandler, Engine, Link, LinkConfig, Packet};
//! use slidr_link::transport::memory_port;
//!
//! struct Device;
//!
//! impl CommandHandler for Device {
//!     fn handle(&mut self, _packet: &Packet, _link: &Link) -> bool {
//!         false
//!     }
//! }
//!
//! let (rx, tx, _host) = memory_port();
//! let engine = Engine::start(&LinkConfig::default(), rx, tx, Device).unwrap();
//! engine.shutdown();
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod health;
pub mod link;
pub mod notify;
pub mod receiver;
pub mod storage;
pub mod transfer;
pub mod transport;
pub mod watchdog;

pub use config::LinkConfig;
pub use dispatcher::{CommandHandler, Dispatcher};
pub use engine::Engine;
pub use error::{ResourceOp, TransferError};
pub use health::LinkHealth;
pub use link::Link;
pub use storage::Storage;
pub use transfer::{Claim, Direction, FileTransfer, SessionInfo};
pub use watchdog::TransferWatchdog;

pub use slidr_protocol::{Command, ErrorCode, FrameError, Packet};
