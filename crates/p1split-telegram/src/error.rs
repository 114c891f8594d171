use std::time::Duration;

/// Errors that can occur while reading or framing telegrams.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The reader could not be set up.
    #[error("reader initialization failed: {0}")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No complete telegram arrived before the read deadline.
    #[error("no complete telegram within {0:?}")]
    Timeout(Duration),

    /// The telegram has no checksum, but the policy requires one.
    #[error("telegram has no checksum, but one is required")]
    ChecksumMissing,

    /// The checksum digits do not match the computed CRC.
    #[error("checksum mismatch (telegram says {expected:04X}, computed {computed:04X})")]
    ChecksumMismatch { expected: u16, computed: u16 },

    /// The checksum line is not four hex digits.
    #[error("checksum line is not 4 hex digits")]
    ChecksumMalformed,

    /// The telegram did not fit in the read buffer.
    #[error("telegram too large (buffer holds {capacity} bytes)")]
    FrameTooLarge { capacity: usize },

    /// A payload handed to the encoder contains the end marker.
    #[error("payload contains end marker '!' at offset {offset}")]
    EndMarkerInPayload { offset: usize },

    /// The inbound link stopped delivering bytes.
    #[error("inbound link closed")]
    LinkClosed,

    /// An I/O error occurred while writing telegrams.
    #[error("telegram I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`TelegramError`], used for read statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Setup failed; fatal to startup.
    Init,
    /// No complete, validly-framed telegram within the deadline.
    Timeout,
    /// Frame completed, but the checksum is missing or wrong.
    Checksum,
    /// Anything else.
    Other,
}

impl TelegramError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Init(_) => ErrorKind::Init,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ChecksumMissing | Self::ChecksumMismatch { .. } | Self::ChecksumMalformed => {
                ErrorKind::Checksum
            }
            _ => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(
            TelegramError::Timeout(Duration::from_secs(5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(TelegramError::ChecksumMissing.kind(), ErrorKind::Checksum);
        assert_eq!(TelegramError::ChecksumMalformed.kind(), ErrorKind::Checksum);
        assert_eq!(
            TelegramError::ChecksumMismatch {
                expected: 1,
                computed: 2
            }
            .kind(),
            ErrorKind::Checksum
        );
        assert_eq!(
            TelegramError::FrameTooLarge { capacity: 8 }.kind(),
            ErrorKind::Other
        );
        assert_eq!(TelegramError::LinkClosed.kind(), ErrorKind::Other);
        assert_eq!(
            TelegramError::Init("no pump".into()).kind(),
            ErrorKind::Init
        );
    }

    #[test]
    fn mismatch_renders_uppercase_hex() {
        let err = TelegramError::ChecksumMismatch {
            expected: 0xab,
            computed: 0x1f2e,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch (telegram says 00AB, computed 1F2E)"
        );
    }
}
