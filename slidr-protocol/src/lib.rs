//! SlidR Serial Protocol
//!
//! This crate defines the USB-serial protocol between the host application and
//! the SlidR device (a row of display + potentiometer segments). The protocol
//! is a request/response stream of checksummed frames; images travel as
//! chunked transfers acknowledged one chunk at a time.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌───────┬─────┬──────────┬─────────────┬──────────┐
//! │ START │ CMD │ LENGTH   │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B  │ 2B (LE)  │ 0–4092B     │ 1B       │
//! └───────┴─────┴──────────┴─────────────┴──────────┘
//! ```
//!
//! The checksum is the XOR of CMD, both LENGTH bytes and every PAYLOAD byte.
//! There is no escaping: a START byte inside a frame is plain data, and
//! resynchronisation relies on the length field plus an inter-byte timeout.

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "std"))]
#[macro_use]
extern crate std;

pub mod commands;
pub mod config;
pub mod frame;
pub mod messages;

pub use commands::{Command, ErrorCode};
pub use config::{ConfigError, DeviceConfig, SegmentConfig};
pub use frame::{
    checksum, FrameError, Framer, Packet, FRAME_START, MAX_FRAME_SIZE, MAX_PACKET_SIZE,
    MAX_PAYLOAD_SIZE, PACKET_TIMEOUT_MS,
};
pub use messages::{DownloadStart, SetBacklight, Status, UploadStart};
