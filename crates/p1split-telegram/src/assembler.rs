//! Byte-level telegram framing state machine.
//!
//! The assembler is fed one byte at a time from the inbound link. It never
//! blocks and never allocates: the buffer it writes into is handed to it when
//! a read is armed and taken back when the read completes or is cancelled.

use crate::checksum::{self, ChecksumStatus};
use crate::config::ChecksumPolicy;
use crate::error::{Result, TelegramError};
use crate::markers::{END_MARKER, LINE_FEED, START_MARKER};

/// Telegram reader states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// No read outstanding.
    #[default]
    Idle,
    /// Waiting for the start marker.
    Synchronizing,
    /// Inside the telegram body, waiting for the end marker.
    AwaitingTerminator,
    /// After the end marker, waiting for the line feed.
    AwaitingChecksumLine,
    /// Telegram complete, waiting for the reader to collect it.
    Complete,
}

impl ReaderState {
    /// The state after receiving `byte` in this state.
    pub fn step(self, byte: u8) -> Self {
        match (self, byte) {
            (Self::Synchronizing, START_MARKER) => Self::AwaitingTerminator,
            (Self::AwaitingTerminator, END_MARKER) => Self::AwaitingChecksumLine,
            (Self::AwaitingChecksumLine, LINE_FEED) => Self::Complete,
            (state, _) => state,
        }
    }

    /// Whether a read is outstanding, i.e. inbound bytes are consumed.
    pub fn is_outstanding(self) -> bool {
        !matches!(self, Self::Idle | Self::Complete)
    }
}

/// Result of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The byte was not consumed.
    Ignored,
    /// The byte belongs to the telegram in progress.
    Consumed,
    /// The byte completed a telegram.
    Complete,
}

/// Shape of a completed telegram inside the assembly buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Bytes written to the buffer.
    pub len: usize,
    /// Offset of the end marker, if it was stored.
    pub end_marker: Option<usize>,
    /// Whether bytes were dropped because the buffer was full.
    pub overflowed: bool,
    /// Capacity the read was armed with.
    pub capacity: usize,
}

impl FrameInfo {
    /// Validate the telegram held in `buf[..self.len]`.
    pub fn validate(&self, buf: &[u8], policy: ChecksumPolicy) -> Result<ChecksumStatus> {
        if self.overflowed {
            return Err(TelegramError::FrameTooLarge {
                capacity: self.capacity,
            });
        }
        let end_marker = self.end_marker.ok_or(TelegramError::ChecksumMalformed)?;
        checksum::verify(&buf[..self.len], end_marker, policy)
    }
}

/// Assembles telegrams from a byte stream.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    state: ReaderState,
    buf: Vec<u8>,
    capacity: usize,
    len: usize,
    end_marker: Option<usize>,
    overflowed: bool,
}

impl FrameAssembler {
    /// Create an idle assembler that writes into `buf`.
    ///
    /// `buf.len()` is the largest capacity a read may be armed with.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            buf,
            ..Self::default()
        }
    }

    /// Start a read: `Idle -> Synchronizing`.
    ///
    /// At most `capacity` bytes are stored; the rest are dropped.
    pub fn arm(&mut self, capacity: usize) {
        self.capacity = capacity.min(self.buf.len());
        self.len = 0;
        self.end_marker = None;
        self.overflowed = false;
        self.state = ReaderState::Synchronizing;
    }

    /// Return to `Idle`, keeping the buffer.
    pub fn reset(&mut self) {
        self.state = ReaderState::Idle;
    }

    /// Swap in a new assembly buffer and return the old one.
    pub fn replace_buffer(&mut self, buf: Vec<u8>) -> Vec<u8> {
        self.capacity = self.capacity.min(buf.len());
        self.len = self.len.min(self.capacity);
        std::mem::replace(&mut self.buf, buf)
    }

    /// Feed one inbound byte.
    pub fn push(&mut self, byte: u8) -> Feed {
        let current = self.state;
        if !current.is_outstanding() {
            return Feed::Ignored;
        }

        let next = current.step(byte);
        match (current, next) {
            (ReaderState::Synchronizing, ReaderState::Synchronizing) => return Feed::Ignored,
            (ReaderState::Synchronizing, _) => self.len = 0,
            (ReaderState::AwaitingTerminator, ReaderState::AwaitingChecksumLine) => {
                self.end_marker = Some(self.len);
            }
            _ => {}
        }

        if self.len < self.capacity {
            self.buf[self.len] = byte;
            self.len += 1;
        } else {
            self.overflowed = true;
        }

        self.state = next;
        if next == ReaderState::Complete {
            Feed::Complete
        } else {
            Feed::Consumed
        }
    }

    /// Current state.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Bytes stored so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Shape of the completed telegram, if the assembler is `Complete`.
    pub fn frame_info(&self) -> Option<FrameInfo> {
        (self.state == ReaderState::Complete).then_some(FrameInfo {
            len: self.len,
            end_marker: self.end_marker.filter(|&at| at < self.len),
            overflowed: self.overflowed,
            capacity: self.capacity,
        })
    }
}
