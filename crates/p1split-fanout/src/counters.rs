//! Port statistics.
//!
//! Counters are relaxed atomics updated by the port threads. Snapshots are
//! eventually consistent and not synchronized with the buffer guards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use p1split_telegram::ErrorKind;
use serde::Serialize;

use crate::slot::RING_DEPTH;

/// Receiver read outcomes.
#[derive(Debug, Default)]
pub struct ReceiverCounters {
    read: AtomicU64,
    failed_timeout: AtomicU64,
    failed_checksum: AtomicU64,
    failed_other: AtomicU64,
}

impl ReceiverCounters {
    pub fn record_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed read under its error class.
    pub fn record_failure(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Timeout => &self.failed_timeout,
            ErrorKind::Checksum => &self.failed_checksum,
            ErrorKind::Init | ErrorKind::Other => &self.failed_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    pub fn failed_timeout(&self) -> u64 {
        self.failed_timeout.load(Ordering::Relaxed)
    }

    pub fn failed_checksum(&self) -> u64 {
        self.failed_checksum.load(Ordering::Relaxed)
    }

    pub fn failed_other(&self) -> u64 {
        self.failed_other.load(Ordering::Relaxed)
    }
}

/// Sender transfer outcomes.
#[derive(Debug, Default)]
pub struct SenderCounters {
    copied: AtomicU64,
    requested: AtomicU64,
    aborted: AtomicU64,
    written: AtomicU64,
}

impl SenderCounters {
    pub fn record_copied(&self) {
        self.copied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requested(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn copied(&self) -> u64 {
        self.copied.load(Ordering::Relaxed)
    }

    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the receiver port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Bytes in the receive buffer.
    pub buffered: usize,
    pub read: u64,
    pub failed_timeout: u64,
    pub failed_checksum: u64,
    pub failed_other: u64,
}

/// Point-in-time view of one sender port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Console port number (1-based).
    pub port: usize,
    pub enabled: bool,
    pub interval_ms: u64,
    /// Current flow-control level.
    pub request_to_send: bool,
    /// Bytes held by each ring slot.
    pub buffered: [usize; RING_DEPTH],
    /// Index of the current (newest) slot.
    pub current: usize,
    pub copied: u64,
    pub requested: u64,
    pub aborted: u64,
    pub written: u64,
}

/// Statistics of the whole splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitterStats {
    pub receiver: ReceiverStats,
    pub senders: Vec<SenderStats>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

impl fmt::Display for SplitterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.receiver;
        writeln!(f, "Port 0 (receiver):")?;
        writeln!(f, "- Enabled: {}", yes_no(r.enabled))?;
        writeln!(f, "- Interval: {} ms", r.interval_ms)?;
        writeln!(f, "- Buffer: {} bytes", r.buffered)?;
        writeln!(f, "- Telegrams read: {}", r.read)?;
        writeln!(f, "- Telegram reads failed (timeout): {}", r.failed_timeout)?;
        writeln!(f, "- Telegram reads failed (checksum): {}", r.failed_checksum)?;
        writeln!(f, "- Telegram reads failed (other): {}", r.failed_other)?;

        for s in &self.senders {
            writeln!(f)?;
            writeln!(f, "Port {} (sender):", s.port)?;
            writeln!(f, "- Enabled: {}", yes_no(s.enabled))?;
            writeln!(f, "- Interval: {} ms", s.interval_ms)?;
            writeln!(f, "- Request to send: {}", yes_no(s.request_to_send))?;
            for (index, len) in s.buffered.iter().enumerate() {
                let current = if index == s.current { " (current)" } else { "" };
                writeln!(f, "- Buffer {index}: {len} bytes{current}")?;
            }
            writeln!(f, "- Telegrams copied: {}", s.copied)?;
            writeln!(f, "- Telegrams requested: {}", s.requested)?;
            writeln!(f, "- Telegram writes aborted: {}", s.aborted)?;
            writeln!(f, "- Telegrams written: {}", s.written)?;
        }
        Ok(())
    }
}
