//! Buffer slots: the unit of telegram hand-off between ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Number of slots in each sender's ring.
///
/// One slot is being transmitted, one holds the newest undelivered
/// telegram, and one is free for the receiver to fill.
pub const RING_DEPTH: usize = 3;

/// Contents of a buffer slot, accessible only while its guard is held.
#[derive(Debug)]
pub struct SlotData {
    data: Vec<u8>,
    len: usize,
}

impl SlotData {
    /// Valid bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Number of valid bytes; zero means empty or already consumed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes the slot holds.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whole backing storage, for reading a telegram straight into the slot.
    /// Follow up with [`SlotData::set_len`].
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Mark the first `len` bytes valid (clamped to capacity).
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Replace the contents with `bytes`, truncated to capacity.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.data.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
        n
    }

    /// Mark the slot consumed.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// A mutually exclusive telegram buffer.
#[derive(Debug)]
pub struct BufferSlot {
    inner: Mutex<SlotData>,
}

impl BufferSlot {
    /// Create an empty slot holding up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SlotData {
                data: vec![0; capacity],
                len: 0,
            }),
        }
    }

    /// Acquire the slot without blocking, or `None` if it is busy.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, SlotData>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Acquire the slot, waiting for the current holder.
    pub fn lock(&self) -> MutexGuard<'_, SlotData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current length (takes the guard).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the valid bytes (takes the guard).
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().as_bytes().to_vec()
    }
}

/// Fixed ring of [`RING_DEPTH`] slots with a head index.
///
/// The head is the slot most recently filled by the receiver, which is the
/// one the sender transmits next.
#[derive(Debug)]
pub struct SlotRing {
    slots: [BufferSlot; RING_DEPTH],
    head: AtomicUsize,
}

impl SlotRing {
    /// Create a ring of empty slots, each holding up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: std::array::from_fn(|_| BufferSlot::new(capacity)),
            head: AtomicUsize::new(0),
        }
    }

    /// Index of the newest slot.
    pub fn head(&self) -> usize {
        self.head.load(Ordering::Relaxed)
    }

    /// Index the receiver fills next.
    pub fn next_index(&self) -> usize {
        (self.head() + 1) % RING_DEPTH
    }

    /// Slot at `index`, if in range.
    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.slots.get(index)
    }

    /// The newest slot and its index.
    pub fn head_slot(&self) -> (usize, &BufferSlot) {
        let head = self.head() % RING_DEPTH;
        (head, &self.slots[head])
    }

    /// Copy `telegram` into the slot after the head and make it the head.
    ///
    /// Never blocks: returns `false` without touching anything if that slot
    /// is held by someone else.
    pub fn try_deliver(&self, telegram: &[u8]) -> bool {
        let next = self.next_index();
        let Some(mut slot) = self.slots[next].try_lock() else {
            return false;
        };
        slot.fill(telegram);
        self.head.store(next, Ordering::Relaxed);
        true
    }

    /// Lengths of all slots (takes each guard in turn).
    pub fn lengths(&self) -> [usize; RING_DEPTH] {
        std::array::from_fn(|i| self.slots[i].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_truncates_to_capacity() {
        let slot = BufferSlot::new(4);
        assert_eq!(slot.lock().fill(b"/abcdef"), 4);
        assert_eq!(slot.snapshot(), b"/abc");
    }

    #[test]
    fn try_lock_fails_while_held() {
        let slot = BufferSlot::new(8);
        let guard = slot.lock();
        assert!(slot.try_lock().is_none());
        drop(guard);
        assert!(slot.try_lock().is_some());
    }

    #[test]
    fn deliveries_rotate_through_ring() {
        let ring = SlotRing::new(16);
        assert_eq!(ring.head(), 0);

        assert!(ring.try_deliver(b"/1!\r\n"));
        assert_eq!(ring.head(), 1);
        assert!(ring.try_deliver(b"/2!\r\n"));
        assert_eq!(ring.head(), 2);
        assert!(ring.try_deliver(b"/3!\r\n"));
        assert_eq!(ring.head(), 0);

        assert_eq!(ring.head_slot().1.snapshot(), b"/3!\r\n");
        assert_eq!(ring.slot(1).unwrap().snapshot(), b"/1!\r\n");
    }

    #[test]
    fn busy_slot_is_skipped_untouched() {
        let ring = SlotRing::new(16);
        ring.try_deliver(b"/old!\r\n");
        assert_eq!(ring.head(), 1);

        let busy = ring.slot(2).unwrap().lock();
        assert!(!ring.try_deliver(b"/new!\r\n"));
        assert_eq!(ring.head(), 1);
        assert!(busy.is_empty());
        drop(busy);

        assert_eq!(ring.head_slot().1.snapshot(), b"/old!\r\n");
    }

    #[test]
    fn lengths_report_every_slot() {
        let ring = SlotRing::new(16);
        ring.try_deliver(b"abc");
        ring.try_deliver(b"de");
        assert_eq!(ring.lengths(), [0, 3, 2]);
    }

    #[test]
    fn out_of_range_slot_is_none() {
        let ring = SlotRing::new(1);
        assert!(ring.slot(RING_DEPTH).is_none());
    }
}
