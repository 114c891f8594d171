use std::time::Duration;

use p1split_telegram::{TelegramError, TelegramReader};
use tracing::{debug, trace};

use crate::counters::{ReceiverCounters, ReceiverStats};
use crate::schedule::PortControl;
use crate::sender::SenderPort;
use crate::slot::BufferSlot;

/// Something that yields one telegram per call.
///
/// Implemented by [`TelegramReader`]; tests substitute scripted sources.
pub trait TelegramSource: Send + Sync {
    /// Read one telegram into `out`, returning its length.
    fn read_into(&self, out: &mut [u8]) -> Result<usize, TelegramError>;
}

impl TelegramSource for TelegramReader {
    fn read_into(&self, out: &mut [u8]) -> Result<usize, TelegramError> {
        self.read(out)
    }
}

/// The input port: reads telegrams and offers them to every sender.
pub struct ReceiverPort {
    control: PortControl,
    buffer: BufferSlot,
    counters: ReceiverCounters,
    source: Box<dyn TelegramSource>,
}

impl ReceiverPort {
    /// Create a receiver with a buffer of `capacity` bytes.
    pub fn new(
        source: Box<dyn TelegramSource>,
        capacity: usize,
        enabled: bool,
        interval: Duration,
    ) -> Self {
        Self {
            control: PortControl::new(enabled, interval),
            buffer: BufferSlot::new(capacity),
            counters: ReceiverCounters::default(),
            source,
        }
    }

    pub fn control(&self) -> &PortControl {
        &self.control
    }

    pub fn counters(&self) -> &ReceiverCounters {
        &self.counters
    }

    /// The receive buffer.
    pub fn buffer(&self) -> &BufferSlot {
        &self.buffer
    }

    /// Run one receive cycle.
    ///
    /// Reads at most one telegram and offers it to every enabled sender.
    /// Returns the number of senders that took it, or `None` if the port is
    /// disabled or the read failed.
    ///
    /// The receive buffer stays locked for the duration of the read.
    pub fn cycle(&self, senders: &[SenderPort]) -> Option<usize> {
        if !self.control.is_enabled() {
            return None;
        }

        let mut buffer = self.buffer.lock();
        let len = match self.source.read_into(buffer.storage_mut()) {
            Ok(len) => len,
            Err(err) => {
                buffer.clear();
                self.counters.record_failure(err.kind());
                debug!(error = %err, "telegram read failed");
                return None;
            }
        };
        buffer.set_len(len);
        self.counters.record_read();

        let telegram = buffer.as_bytes();
        let delivered = senders
            .iter()
            .filter(|sender| sender.control().is_enabled())
            .filter(|sender| sender.offer(telegram))
            .count();
        trace!(bytes = len, delivered, "telegram fanned out");
        Some(delivered)
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            enabled: self.control.is_enabled(),
            interval_ms: u64::try_from(self.control.interval().as_millis()).unwrap_or(u64::MAX),
            buffered: self.buffer.len(),
            read: self.counters.read(),
            failed_timeout: self.counters.failed_timeout(),
            failed_checksum: self.counters.failed_checksum(),
            failed_other: self.counters.failed_other(),
        }
    }
}

impl std::fmt::Debug for ReceiverPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverPort")
            .field("control", &self.control)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
