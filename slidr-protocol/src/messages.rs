//! Fixed-layout payloads
//!
//! Commands with a structured payload get a small struct here with a strict
//! parser (exact length) and an encoder back into a [`Packet`].

use crate::commands::Command;
use crate::frame::{FrameError, Packet};

/// `UPLOAD_IMAGE_START`: `[segment:u8][total:u32 LE]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UploadStart {
    pub segment: u8,
    pub total_size: u32,
}

impl UploadStart {
    pub const LEN: usize = 5;

    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() != Self::LEN {
            return Err(FrameError::InvalidPayload);
        }
        Ok(Self {
            segment: payload[0],
            total_size: u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]),
        })
    }

    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        let [a, b, c, d] = self.total_size.to_le_bytes();
        Packet::new(Command::UploadImageStart, &[self.segment, a, b, c, d])
    }
}

/// `DOWNLOAD_IMAGE_START`: `[segment:u8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DownloadStart {
    pub segment: u8,
}

impl DownloadStart {
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        match payload {
            [segment] => Ok(Self { segment: *segment }),
            _ => Err(FrameError::InvalidPayload),
        }
    }

    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        Packet::new(Command::DownloadImageStart, &[self.segment])
    }
}

/// `SET_BACKLIGHT`: `[level:u8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetBacklight {
    pub level: u8,
}

impl SetBacklight {
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        match payload {
            [level] => Ok(Self { level: *level }),
            _ => Err(FrameError::InvalidPayload),
        }
    }
}

/// `STATUS_DATA`: `[awake:u8][backlight:u8][segment_count:u8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub awake: bool,
    pub backlight: u8,
    pub segment_count: u8,
}

impl Status {
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        match payload {
            [awake, backlight, segment_count] => Ok(Self {
                awake: *awake != 0,
                backlight: *backlight,
                segment_count: *segment_count,
            }),
            _ => Err(FrameError::InvalidPayload),
        }
    }

    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        Packet::new(
            Command::StatusData,
            &[self.awake as u8, self.backlight, self.segment_count],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_start_parse() {
        let msg = UploadStart::from_payload(&[3, 0x10, 0x27, 0x00, 0x00]).unwrap();
        assert_eq!(msg.segment, 3);
        assert_eq!(msg.total_size, 10_000);
    }

    #[test]
    fn test_upload_start_wrong_length() {
        assert_eq!(
            UploadStart::from_payload(&[3, 0x10, 0x27]),
            Err(FrameError::InvalidPayload)
        );
        assert_eq!(
            UploadStart::from_payload(&[3, 0, 0, 0, 0, 0]),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_upload_start_packet_layout() {
        let packet = UploadStart {
            segment: 1,
            total_size: 0x0102_0304,
        }
        .to_packet()
        .unwrap();
        assert_eq!(packet.command(), Some(Command::UploadImageStart));
        assert_eq!(packet.payload.as_slice(), &[1, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_download_start() {
        assert_eq!(
            DownloadStart::from_payload(&[4]),
            Ok(DownloadStart { segment: 4 })
        );
        assert_eq!(
            DownloadStart::from_payload(&[]),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_status_packet() {
        let packet = Status {
            awake: true,
            backlight: 200,
            segment_count: 5,
        }
        .to_packet()
        .unwrap();
        assert_eq!(packet.command(), Some(Command::StatusData));
        assert_eq!(packet.payload.as_slice(), &[1, 200, 5]);
    }

    #[test]
    fn test_set_backlight() {
        assert_eq!(
            SetBacklight::from_payload(&[128]),
            Ok(SetBacklight { level: 128 })
        );
        assert!(SetBacklight::from_payload(&[1, 2]).is_err());
    }
}
