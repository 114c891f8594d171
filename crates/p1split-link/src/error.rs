use std::path::PathBuf;

/// Errors that can occur in serial link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Failed to open the serial device at the specified path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to drive or sample a modem control line.
    #[error("control line {line} failed: {source}")]
    ControlLine {
        line: &'static str,
        source: serialport::Error,
    },

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed by the other side.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;
