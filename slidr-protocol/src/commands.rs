//! Command and error identifiers
//!
//! Direction notes use H for the host application and D for the device.

/// Command identifiers carried in the CMD byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// H→D heartbeat, answered with PONG
    Ping = 0x01,
    /// D→H heartbeat response
    Pong = 0x02,
    /// H→D replace the device configuration blob
    SetConfig = 0x03,
    /// H→D request the configuration blob
    GetConfig = 0x04,
    /// D→H configuration blob
    ConfigData = 0x05,
    /// H→D restore factory defaults
    DefaultConfig = 0x06,
    /// H→D `[segment:u8][total:u32 LE]`
    UploadImageStart = 0x07,
    /// H→D raw image chunk
    UploadImageData = 0x08,
    /// H→D no payload, finalizes the upload
    UploadImageEnd = 0x09,
    /// H→D `[segment:u8]`
    DownloadImageStart = 0x0A,
    /// D→H raw image chunk
    DownloadImageData = 0x0B,
    /// D→H no payload, download finished
    DownloadImageEnd = 0x0C,
    /// Both directions, no payload
    Ack = 0x0D,
    /// D→H `[segment:u8][value:u8]`
    SliderValue = 0x0E,
    /// H→D `[level:u8]`
    SetBacklight = 0x0F,
    /// D→H `[code:u8]`
    ErrorCmd = 0x10,
    /// H→D request STATUS_DATA
    GetStatus = 0x11,
    /// D→H `[awake:u8][backlight:u8][segment_count:u8]`
    StatusData = 0x12,
    /// D→H ASCII text without terminator
    LogMessage = 0x13,
    /// H→D reserved, always rejected
    ChangeBaudrate = 0x14,
}

impl Command {
    /// Parse a command from its wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        use Command::*;
        let cmd = match value {
            0x01 => Ping,
            0x02 => Pong,
            0x03 => SetConfig,
            0x04 => GetConfig,
            0x05 => ConfigData,
            0x06 => DefaultConfig,
            0x07 => UploadImageStart,
            0x08 => UploadImageData,
            0x09 => UploadImageEnd,
            0x0A => DownloadImageStart,
            0x0B => DownloadImageData,
            0x0C => DownloadImageEnd,
            0x0D => Ack,
            0x0E => SliderValue,
            0x0F => SetBacklight,
            0x10 => ErrorCmd,
            0x11 => GetStatus,
            0x12 => StatusData,
            0x13 => LogMessage,
            0x14 => ChangeBaudrate,
            _ => return None,
        };
        Some(cmd)
    }

    /// Wire byte of this command
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true for commands owned by the file transfer subsystem
    pub fn is_transfer(self) -> bool {
        matches!(
            self,
            Command::UploadImageStart
                | Command::UploadImageData
                | Command::UploadImageEnd
                | Command::DownloadImageStart
                | Command::DownloadImageData
                | Command::DownloadImageEnd
        )
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd.as_u8()
    }
}

/// Error codes carried by ERROR_CMD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    InvalidCommand = 1,
    ChecksumError = 2,
    FileError = 3,
    InvalidConfig = 4,
    BufferOverflow = 5,
    TransferInProgress = 6,
    TransferTimeout = 7,
}

impl ErrorCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ErrorCode::None),
            1 => Some(ErrorCode::InvalidCommand),
            2 => Some(ErrorCode::ChecksumError),
            3 => Some(ErrorCode::FileError),
            4 => Some(ErrorCode::InvalidConfig),
            5 => Some(ErrorCode::BufferOverflow),
            6 => Some(ErrorCode::TransferInProgress),
            7 => Some(ErrorCode::TransferTimeout),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_ids_are_contiguous() {
        for id in 0x01..=0x14u8 {
            let cmd = Command::from_u8(id).unwrap();
            assert_eq!(cmd.as_u8(), id);
        }
        assert!(Command::from_u8(0x00).is_none());
        assert!(Command::from_u8(0x15).is_none());
        assert!(Command::from_u8(0xAA).is_none());
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Command::UploadImageStart.as_u8(), 0x07);
        assert_eq!(Command::Ack.as_u8(), 0x0D);
        assert_eq!(Command::ErrorCmd.as_u8(), 0x10);
        assert_eq!(Command::LogMessage.as_u8(), 0x13);
    }

    #[test]
    fn test_is_transfer() {
        assert!(Command::UploadImageData.is_transfer());
        assert!(Command::DownloadImageEnd.is_transfer());
        assert!(!Command::Ack.is_transfer());
        assert!(!Command::Ping.is_transfer());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::from_u8(0), Some(ErrorCode::None));
        assert_eq!(ErrorCode::from_u8(5), Some(ErrorCode::BufferOverflow));
        assert_eq!(ErrorCode::TransferTimeout.as_u8(), 7);
        assert_eq!(ErrorCode::from_u8(8), None);
    }
}
