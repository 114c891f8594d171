use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::counters::{SenderCounters, SenderStats};
use crate::schedule::PortControl;
use crate::slot::{BufferSlot, SlotRing};

/// Result of one transmit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmit {
    /// Disabled, not requested, or nothing new to send.
    Idle,
    /// The whole telegram went out.
    Written { bytes: usize },
    /// The consumer dropped its request mid-telegram.
    Aborted { sent: usize, remaining: usize },
    /// The outbound link failed mid-telegram.
    Failed { sent: usize },
}

/// One output port: a ring of telegram slots drained to an outbound link
/// under hardware flow control.
#[derive(Debug)]
pub struct SenderPort {
    port: usize,
    control: PortControl,
    ring: SlotRing,
    flow: AtomicBool,
    counters: SenderCounters,
}

impl SenderPort {
    /// Create sender `port` (1-based console number) with slots of
    /// `capacity` bytes.
    pub fn new(port: usize, capacity: usize, enabled: bool, interval: Duration) -> Self {
        Self {
            port,
            control: PortControl::new(enabled, interval),
            ring: SlotRing::new(capacity),
            flow: AtomicBool::new(false),
            counters: SenderCounters::default(),
        }
    }

    pub fn port(&self) -> usize {
        self.port
    }

    pub fn control(&self) -> &PortControl {
        &self.control
    }

    pub fn counters(&self) -> &SenderCounters {
        &self.counters
    }

    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    /// Ring slot `index`, if in range.
    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.ring.slot(index)
    }

    /// Offer a telegram from the receiver. Never blocks.
    ///
    /// Returns `false` if the next slot is busy; the port then misses this
    /// telegram.
    pub fn offer(&self, telegram: &[u8]) -> bool {
        if self.ring.try_deliver(telegram) {
            self.counters.record_copied();
            trace!(port = self.port, slot = self.ring.head(), "telegram copied");
            true
        } else {
            debug!(port = self.port, "next slot busy, telegram skipped");
            false
        }
    }

    /// Flow-control edge handler. Counts rising edges as requests.
    pub fn on_flow_level(&self, asserted: bool) {
        let previous = self.flow.swap(asserted, Ordering::Relaxed);
        if asserted && !previous {
            self.counters.record_requested();
        }
    }

    /// Store the flow level without counting a request.
    pub fn set_flow_level(&self, asserted: bool) {
        self.flow.store(asserted, Ordering::Relaxed);
    }

    pub fn flow_asserted(&self) -> bool {
        self.flow.load(Ordering::Relaxed)
    }

    /// Transmit the head slot to `out` if the port is enabled, the consumer
    /// requests data and there is something new to send.
    ///
    /// The flow level is re-checked before every byte. Whatever the outcome,
    /// the slot is emptied so a telegram is never sent twice.
    pub fn transmit_cycle<W: Write + ?Sized>(&self, out: &mut W) -> Transmit {
        if !self.control.is_enabled() || !self.flow_asserted() {
            return Transmit::Idle;
        }

        let (head, slot) = self.ring.head_slot();
        let mut slot = slot.lock();
        if slot.is_empty() {
            return Transmit::Idle;
        }

        let outcome = self.send_bytes(slot.as_bytes(), out);
        slot.clear();
        drop(slot);

        match outcome {
            Transmit::Written { bytes } => {
                self.counters.record_written();
                debug!(port = self.port, slot = head, bytes, "telegram written");
            }
            Transmit::Aborted { sent, remaining } => {
                self.counters.record_aborted();
                debug!(port = self.port, slot = head, sent, remaining, "write aborted");
            }
            Transmit::Failed { .. } => self.counters.record_aborted(),
            Transmit::Idle => {}
        }
        outcome
    }

    fn send_bytes<W: Write + ?Sized>(&self, telegram: &[u8], out: &mut W) -> Transmit {
        for (sent, byte) in telegram.iter().enumerate() {
            if !self.flow_asserted() {
                return Transmit::Aborted {
                    sent,
                    remaining: telegram.len() - sent,
                };
            }
            if let Err(err) = write_byte(out, *byte) {
                warn!(port = self.port, sent, error = %err, "outbound link write failed");
                return Transmit::Failed { sent };
            }
        }
        if let Err(err) = out.flush() {
            warn!(port = self.port, error = %err, "outbound link flush failed");
            return Transmit::Failed {
                sent: telegram.len(),
            };
        }
        Transmit::Written {
            bytes: telegram.len(),
        }
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            port: self.port,
            enabled: self.control.is_enabled(),
            interval_ms: u64::try_from(self.control.interval().as_millis()).unwrap_or(u64::MAX),
            request_to_send: self.flow_asserted(),
            buffered: self.ring.lengths(),
            current: self.ring.head(),
            copied: self.counters.copied(),
            requested: self.counters.requested(),
            aborted: self.counters.aborted(),
            written: self.counters.written(),
        }
    }
}

fn write_byte<W: Write + ?Sized>(out: &mut W, byte: u8) -> std::io::Result<()> {
    loop {
        match out.write(&[byte]) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TELEGRAM: &[u8] = b"/XMX5\r\n\r\n1-0:1.8.1(000001.000*kWh)\r\n!1234\r\n";

    fn sender() -> SenderPort {
        SenderPort::new(1, 256, true, Duration::from_millis(10))
    }

    #[test]
    fn writes_requested_telegram_once() {
        let port = sender();
        port.on_flow_level(true);
        assert!(port.offer(TELEGRAM));

        let mut out = Vec::new();
        assert_eq!(
            port.transmit_cycle(&mut out),
            Transmit::Written {
                bytes: TELEGRAM.len()
            }
        );
        assert_eq!(out, TELEGRAM);
        assert_eq!(port.counters().written(), 1);

        assert_eq!(port.transmit_cycle(&mut out), Transmit::Idle);
        assert_eq!(out.len(), TELEGRAM.len());
        assert_eq!(port.ring().head_slot().1.len(), 0);
    }

    #[test]
    fn idle_without_request_or_when_disabled() {
        let port = sender();
        port.offer(TELEGRAM);

        let mut out = Vec::new();
        assert_eq!(port.transmit_cycle(&mut out), Transmit::Idle);

        port.on_flow_level(true);
        port.control().set_enabled(false);
        assert_eq!(port.transmit_cycle(&mut out), Transmit::Idle);
        assert!(out.is_empty());
        assert_eq!(port.ring().head_slot().1.len(), TELEGRAM.len());
    }

    #[test]
    fn deasserted_flow_aborts_and_empties_slot() {
        let port = Arc::new(sender());
        port.on_flow_level(true);
        port.offer(TELEGRAM);

        let mut out = DropRequestAfter {
            port: Arc::clone(&port),
            limit: 5,
            data: Vec::new(),
        };
        let outcome = port.transmit_cycle(&mut out);

        assert_eq!(
            outcome,
            Transmit::Aborted {
                sent: 5,
                remaining: TELEGRAM.len() - 5
            }
        );
        assert_eq!(out.data, &TELEGRAM[..5]);
        assert_eq!(port.counters().aborted(), 1);
        assert_eq!(port.counters().written(), 0);
        assert_eq!(port.ring().head_slot().1.len(), 0);

        // The consumer asks again: the aborted telegram is not resent.
        port.on_flow_level(true);
        assert_eq!(port.transmit_cycle(&mut out), Transmit::Idle);
        assert_eq!(out.data, &TELEGRAM[..5]);
        assert_eq!(port.counters().written(), 0);
    }

    #[test]
    fn failed_link_counts_as_aborted() {
        let port = sender();
        port.on_flow_level(true);
        port.offer(TELEGRAM);

        let outcome = port.transmit_cycle(&mut BrokenLink);
        assert_eq!(outcome, Transmit::Failed { sent: 0 });
        assert_eq!(port.counters().aborted(), 1);
        assert_eq!(port.ring().head_slot().1.len(), 0);
    }

    #[test]
    fn only_rising_edges_count_as_requests() {
        let port = sender();
        for level in [true, true, false, false, true, false, true] {
            port.on_flow_level(level);
        }
        assert_eq!(port.counters().requested(), 3);
        assert!(port.flow_asserted());
    }

    #[test]
    fn sends_newest_telegram() {
        let port = sender();
        port.on_flow_level(true);
        port.offer(b"/old!\r\n");
        port.offer(b"/new!\r\n");

        let mut out = Vec::new();
        port.transmit_cycle(&mut out);
        assert_eq!(out, b"/new!\r\n");
        assert_eq!(port.counters().copied(), 2);
    }

    #[test]
    fn offer_skips_slot_held_by_transmitter() {
        let port = sender();
        port.offer(b"/a!\r\n");
        port.offer(b"/b!\r\n");
        // head is 2, the receiver fills slot 0 next
        let held = port.slot(0).unwrap().lock();
        assert!(!port.offer(b"/c!\r\n"));
        drop(held);

        assert_eq!(port.ring().head(), 2);
        assert_eq!(port.counters().copied(), 2);
    }

    #[test]
    fn stats_reflect_ring() {
        let port = sender();
        port.offer(b"/a!\r\n");
        let stats = port.stats();
        assert_eq!(stats.port, 1);
        assert_eq!(stats.buffered, [0, 5, 0]);
        assert_eq!(stats.current, 1);
        assert_eq!(stats.copied, 1);
        assert!(!stats.request_to_send);
    }

    /// Outbound link whose consumer drops its request after `limit` bytes.
    struct DropRequestAfter {
        port: Arc<SenderPort>,
        limit: usize,
        data: Vec<u8>,
    }

    impl Write for DropRequestAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            if self.data.len() >= self.limit {
                self.port.on_flow_level(false);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenLink;

    impl Write for BrokenLink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
