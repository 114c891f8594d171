use std::fmt;
use std::io;

use p1split_fanout::SplitterError;
use p1split_link::LinkError;
use p1split_telegram::TelegramError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

fn serial_code(err: &serialport::Error) -> i32 {
    match err.kind() {
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
        serialport::ErrorKind::InvalidInput => USAGE,
        _ => TRANSPORT_ERROR,
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Open { ref source, .. } => {
            CliError::new(serial_code(source), format!("{context}: {err}"))
        }
        LinkError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn telegram_error(context: &str, err: TelegramError) -> CliError {
    match err {
        TelegramError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TelegramError::ChecksumMissing
        | TelegramError::ChecksumMismatch { .. }
        | TelegramError::ChecksumMalformed
        | TelegramError::FrameTooLarge { .. }
        | TelegramError::EndMarkerInPayload { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TelegramError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn splitter_error(context: &str, err: SplitterError) -> CliError {
    match err {
        SplitterError::Telegram(err) => telegram_error(context, err),
        SplitterError::Link(err) => link_error(context, err),
        SplitterError::ConfigFile { source, .. } => io_error(context, source),
        SplitterError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SplitterError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
