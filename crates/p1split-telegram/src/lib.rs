//! DSMR P1 telegram framing and reading.
//!
//! A telegram on the wire looks like:
//! - A `/` start marker followed by the meter identification
//! - Data lines, none of which contain `!`
//! - A `!` end marker, an optional 4-digit CRC-16 and a line break
//!
//! [`TelegramReader`] pulls complete, checksum-verified telegrams off an
//! inbound link within a deadline. [`TelegramDecoder`] and
//! [`TelegramWriter`] handle captured streams and meter simulation.

pub mod assembler;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod markers;
pub mod reader;
pub mod writer;

pub use assembler::{Feed, FrameAssembler, FrameInfo, ReaderState};
pub use checksum::{crc16, ChecksumStatus};
pub use codec::{encode_telegram, Telegram, TelegramDecoder};
pub use config::{
    ChecksumPolicy, ProtocolVersion, ReaderConfig, DEFAULT_READ_TIMEOUT, DEFAULT_TELEGRAM_SIZE,
};
pub use error::{ErrorKind, Result, TelegramError};
pub use markers::{END_MARKER, START_MARKER};
pub use reader::TelegramReader;
pub use writer::TelegramWriter;
