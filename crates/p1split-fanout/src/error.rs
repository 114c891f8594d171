use std::path::PathBuf;

/// Errors that can occur while setting up or running the splitter.
#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    /// Telegram reader error.
    #[error("telegram reader error: {0}")]
    Telegram(#[from] p1split_telegram::TelegramError),

    /// Serial link error.
    #[error("link error: {0}")]
    Link(#[from] p1split_link::LinkError),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for a splitter.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration is structurally valid but unusable.
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SplitterError>;

/// Rejected console commands. State is never changed when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The command word is not known.
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    /// Wrong number of arguments.
    #[error("usage: {usage}")]
    Usage { usage: String },

    /// Port number outside `0..=ports`.
    #[error("port {port} out of range (0-{max})")]
    PortOutOfRange { port: usize, max: usize },

    /// Buffer slot index out of range for the port.
    #[error("slot {slot} out of range (0-{max})")]
    SlotOutOfRange { slot: usize, max: usize },

    /// An argument is not a valid number for its position.
    #[error("invalid {what}: '{value}'")]
    InvalidValue { what: &'static str, value: String },
}
