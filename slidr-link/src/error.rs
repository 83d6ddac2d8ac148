//! Error types for file transfers

use std::fmt;
use std::io;

use slidr_protocol::ErrorCode;

/// Operation that failed on a file or the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOp {
    Open,
    Read,
    Write,
    Remove,
    CreateDir,
    Rename,
    Send,
    Spawn,
}

impl ResourceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceOp::Open => "open",
            ResourceOp::Read => "read",
            ResourceOp::Write => "write",
            ResourceOp::Remove => "remove",
            ResourceOp::CreateDir => "create directory",
            ResourceOp::Rename => "rename",
            ResourceOp::Send => "send",
            ResourceOp::Spawn => "spawn",
        }
    }
}

/// Why a transfer command failed
#[derive(Debug)]
pub enum TransferError {
    /// A session is already active
    InProgress,
    /// The command needs an active session
    NotActive,
    /// Fixed-size payload has the wrong length
    InvalidPayload,
    /// `UPLOAD_IMAGE_END` before the announced size arrived
    SizeMismatch { received: u32, expected: u32 },
    /// File or transport failure
    Resource { op: ResourceOp, source: io::Error },
    /// Watchdog fired
    Timeout,
}

impl TransferError {
    /// Adapter for `map_err` on io results
    pub fn resource(op: ResourceOp) -> impl FnOnce(io::Error) -> Self {
        move |source| TransferError::Resource { op, source }
    }

    /// Wire code reported in `ERROR_CMD`
    pub fn code(&self) -> ErrorCode {
        match self {
            TransferError::InProgress => ErrorCode::TransferInProgress,
            TransferError::NotActive
            | TransferError::InvalidPayload
            | TransferError::SizeMismatch { .. } => ErrorCode::InvalidCommand,
            TransferError::Resource { .. } => ErrorCode::FileError,
            TransferError::Timeout => ErrorCode::TransferTimeout,
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::InProgress => write!(f, "Transfer already in progress"),
            TransferError::NotActive => write!(f, "No active transfer"),
            TransferError::InvalidPayload => write!(f, "Invalid transfer payload"),
            TransferError::SizeMismatch { received, expected } => {
                write!(f, "Size mismatch: {} / {}", received, expected)
            }
            TransferError::Resource { op, source } => {
                write!(f, "Failed to {} file: {}", op.as_str(), source)
            }
            TransferError::Timeout => write!(f, "Transfer timeout"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Resource { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::InProgress.code(), ErrorCode::TransferInProgress);
        assert_eq!(TransferError::NotActive.code(), ErrorCode::InvalidCommand);
        assert_eq!(
            TransferError::SizeMismatch {
                received: 5,
                expected: 10
            }
            .code(),
            ErrorCode::InvalidCommand
        );
        assert_eq!(TransferError::Timeout.code(), ErrorCode::TransferTimeout);

        let err = TransferError::resource(ResourceOp::Rename)(io::Error::other("busy"));
        assert_eq!(err.code(), ErrorCode::FileError);
    }

    #[test]
    fn test_display() {
        let err = TransferError::resource(ResourceOp::Open)(io::Error::new(
            io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(err.to_string(), "Failed to open file: missing");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            TransferError::SizeMismatch {
                received: 5,
                expected: 10
            }
            .to_string(),
            "Size mismatch: 5 / 10"
        );
    }
}
