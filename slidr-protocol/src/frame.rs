//! Frame encoding and decoding for the SlidR protocol.
//!
//! Frame format:
//! - START (1 byte): 0xAA synchronization byte
//! - CMD (1 byte): command identifier
//! - LENGTH (2 bytes, little endian): payload length (0-4092)
//! - PAYLOAD (0-4092 bytes): command-specific data
//! - CHECKSUM (1 byte): XOR of CMD, both LENGTH bytes, and all PAYLOAD bytes

use heapless::Vec;

use crate::commands::{Command, ErrorCode};

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Receive buffer size: CMD + LENGTH + PAYLOAD + CHECKSUM
pub const MAX_PACKET_SIZE: usize = 4096;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - 4;

/// Maximum complete frame size (START + CMD + LENGTH + MAX_PAYLOAD + CHECKSUM)
pub const MAX_FRAME_SIZE: usize = 1 + MAX_PACKET_SIZE;

/// Inter-byte timeout after which a partial frame is dropped
pub const PACKET_TIMEOUT_MS: u32 = 1000;

/// Bytes before the payload in the receive buffer (CMD + LENGTH)
const HEADER_LEN: usize = 3;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Declared LENGTH exceeds the receive buffer
    Overflow { declared: u16 },
    /// Checksum mismatch
    InvalidChecksum { received: u8, calculated: u8 },
    /// Partial frame went stale
    Timeout,
    /// Payload does not match the fixed layout of its command
    InvalidPayload,
    /// Buffer too small for encoding
    BufferTooSmall,
}

impl FrameError {
    /// Wire error code reported to the host, if this error has one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            FrameError::Overflow { .. } | FrameError::PayloadTooLarge => {
                Some(ErrorCode::BufferOverflow)
            }
            FrameError::InvalidChecksum { .. } => Some(ErrorCode::ChecksumError),
            FrameError::InvalidPayload => Some(ErrorCode::InvalidCommand),
            FrameError::Timeout | FrameError::BufferTooSmall => None,
        }
    }
}

/// XOR checksum over CMD, LENGTH and PAYLOAD, in transmission order
pub fn checksum(cmd: u8, payload: &[u8]) -> u8 {
    let len = payload.len() as u16;
    let [len_lo, len_hi] = len.to_le_bytes();
    xor_fold(cmd ^ len_lo ^ len_hi, payload)
}

fn xor_fold(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, &b| acc ^ b)
}

/// A validated packet: command byte plus bounded payload
///
/// The command is kept as a raw byte so that unknown ids still reach the
/// dispatcher, which answers them with `INVALID_COMMAND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command identifier
    pub cmd: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Packet {
    /// Create a new packet with the given command and payload
    pub fn new(cmd: Command, payload: &[u8]) -> Result<Self, FrameError> {
        Self::from_raw(cmd.as_u8(), payload)
    }

    /// Create a packet from a raw command byte
    pub fn from_raw(cmd: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { cmd, payload })
    }

    /// Create a packet with no payload
    pub fn empty(cmd: Command) -> Self {
        Self {
            cmd: cmd.as_u8(),
            payload: Vec::new(),
        }
    }

    /// Zero-payload acknowledgement
    pub fn ack() -> Self {
        Self::empty(Command::Ack)
    }

    /// `ERROR_CMD([code])`
    pub fn error(code: ErrorCode) -> Self {
        let mut payload = Vec::new();
        // Capacity is far above one byte
        let _ = payload.push(code.as_u8());
        Self {
            cmd: Command::ErrorCmd.as_u8(),
            payload,
        }
    }

    /// `LOG_MESSAGE(text)`, truncated to the maximum payload size
    pub fn log(text: &str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_PAYLOAD_SIZE);
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&bytes[..len]);
        Self {
            cmd: Command::LogMessage.as_u8(),
            payload,
        }
    }

    /// The command, if the id is known
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.cmd)
    }

    /// Size of this packet on the wire
    pub fn encoded_len(&self) -> usize {
        1 + HEADER_LEN + self.payload.len() + 1
    }

    /// Encode this packet into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let [len_lo, len_hi] = (self.payload.len() as u16).to_le_bytes();
        let payload_end = 4 + self.payload.len();

        buffer[0] = FRAME_START;
        buffer[1] = self.cmd;
        buffer[2] = len_lo;
        buffer[3] = len_hi;
        buffer[4..payload_end].copy_from_slice(&self.payload);
        buffer[payload_end] = checksum(self.cmd, &self.payload);

        Ok(frame_len)
    }

    /// Encode this packet into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut vec = Vec::new();
        vec.resize(self.encoded_len(), 0)
            .map_err(|_| FrameError::BufferTooSmall)?;
        self.encode(&mut vec)?;
        Ok(vec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Waiting for START byte
    Idle,
    /// Accumulating CMD, LENGTH, PAYLOAD and CHECKSUM
    InPacket,
}

/// State machine turning a byte stream into validated packets
///
/// Timestamps are caller-supplied milliseconds from any monotonic source;
/// wrap-around is handled. `tick` must be called regularly even when no
/// bytes arrive, otherwise a truncated frame would hold the parser forever.
#[derive(Debug, Clone)]
pub struct Framer {
    state: RxState,
    /// CMD, LENGTH, PAYLOAD and CHECKSUM bytes of the frame in progress
    buffer: Vec<u8, MAX_PACKET_SIZE>,
    expected_len: u16,
    last_byte_ms: u32,
    timeout_ms: u32,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create a framer with the protocol's 1000 ms inter-byte timeout
    pub fn new() -> Self {
        Self::with_timeout(PACKET_TIMEOUT_MS)
    }

    pub fn with_timeout(timeout_ms: u32) -> Self {
        Self {
            state: RxState::Idle,
            buffer: Vec::new(),
            expected_len: 0,
            last_byte_ms: 0,
            timeout_ms,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = RxState::Idle;
        self.buffer.clear();
        self.expected_len = 0;
    }

    /// True while no frame is being accumulated
    pub fn is_idle(&self) -> bool {
        self.state == RxState::Idle
    }

    /// Bytes accumulated for the current frame (START excluded)
    pub fn bytes_so_far(&self) -> usize {
        self.buffer.len()
    }

    /// Drop a stale partial frame
    ///
    /// Returns `Err(FrameError::Timeout)` when a frame was discarded.
    pub fn tick(&mut self, now_ms: u32) -> Result<(), FrameError> {
        if self.state == RxState::InPacket
            && now_ms.wrapping_sub(self.last_byte_ms) > self.timeout_ms
        {
            self.reset();
            return Err(FrameError::Timeout);
        }
        Ok(())
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(packet))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when the frame in
    /// progress was discarded. The parser is back to idle after any error.
    pub fn feed(&mut self, byte: u8, now_ms: u32) -> Result<Option<Packet>, FrameError> {
        match self.state {
            RxState::Idle => {
                if byte == FRAME_START {
                    self.buffer.clear();
                    self.expected_len = 0;
                    self.state = RxState::InPacket;
                    self.last_byte_ms = now_ms;
                }
                // Silently ignore non-START bytes while waiting
                Ok(None)
            }
            RxState::InPacket => {
                self.last_byte_ms = now_ms;
                if self.buffer.push(byte).is_err() {
                    // Unreachable given the length check below
                    self.reset();
                    return Err(FrameError::Overflow {
                        declared: self.expected_len,
                    });
                }

                if self.buffer.len() == HEADER_LEN {
                    let declared = u16::from_le_bytes([self.buffer[1], self.buffer[2]]);
                    if declared as usize > MAX_PAYLOAD_SIZE {
                        self.reset();
                        return Err(FrameError::Overflow { declared });
                    }
                    self.expected_len = declared;
                }

                if self.buffer.len() > HEADER_LEN
                    && self.buffer.len() == self.expected_len as usize + HEADER_LEN + 1
                {
                    return self.finish();
                }
                Ok(None)
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete packet found, if any.
    /// Remaining bytes after a complete packet are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8], now_ms: u32) -> Result<Option<Packet>, FrameError> {
        for &byte in bytes {
            if let Some(packet) = self.feed(byte, now_ms)? {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<Option<Packet>, FrameError> {
        let (body, tail) = self.buffer.split_at(self.buffer.len() - 1);
        let received = tail[0];
        let calculated = xor_fold(0, body);

        if received != calculated {
            self.reset();
            return Err(FrameError::InvalidChecksum {
                received,
                calculated,
            });
        }

        let packet = Packet::from_raw(body[0], &body[HEADER_LEN..]);
        self.reset();
        packet.map(Some)
    }
}
