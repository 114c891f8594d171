//! Periodic port scheduling and shutdown signalling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default port period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Operator-adjustable port fields.
///
/// Both are relaxed atomics: a change is picked up by the port's next cycle.
#[derive(Debug)]
pub struct PortControl {
    enabled: AtomicBool,
    interval_ms: AtomicU64,
}

impl PortControl {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            interval_ms: AtomicU64::new(duration_ms(interval)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Set the period. Zero is clamped to one millisecond.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(duration_ms(interval).max(1), Ordering::Relaxed);
    }
}

impl Default for PortControl {
    fn default() -> Self {
        Self::new(true, DEFAULT_INTERVAL)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Process-wide stop signal that wakes sleeping ports.
#[derive(Debug, Default)]
pub struct Shutdown {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until `deadline` or shutdown. Returns `true` on shutdown.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *stopped {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            stopped = self
                .wake
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Fixed-rate wakeups.
///
/// Each period starts `interval` after the previous one. When a cycle
/// overran its period the schedule restarts from now instead of firing a
/// burst of catch-up cycles.
#[derive(Debug)]
pub struct Ticker {
    last: Instant,
}

impl Ticker {
    /// Start the schedule now.
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Wait for the next period. Returns `false` once shutdown is requested.
    pub fn wait(&mut self, interval: Duration, shutdown: &Shutdown) -> bool {
        let target = self.last + interval;
        let now = Instant::now();
        if target <= now {
            self.last = now;
            return !shutdown.is_triggered();
        }
        if shutdown.wait_until(target) {
            return false;
        }
        self.last = target;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn port_control_round_trips() {
        let control = PortControl::default();
        assert!(control.is_enabled());
        assert_eq!(control.interval(), DEFAULT_INTERVAL);

        control.set_enabled(false);
        control.set_interval(Duration::from_millis(250));
        assert!(!control.is_enabled());
        assert_eq!(control.interval(), Duration::from_millis(250));

        control.set_interval(Duration::ZERO);
        assert_eq!(control.interval(), Duration::from_millis(1));
    }

    #[test]
    fn ticker_keeps_fixed_rate() {
        let shutdown = Shutdown::new();
        let mut ticker = Ticker::start();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(ticker.wait(Duration::from_millis(30), &shutdown));
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(85));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn ticker_does_not_burst_after_overrun() {
        let shutdown = Shutdown::new();
        let mut ticker = Ticker::start();
        std::thread::sleep(Duration::from_millis(100));

        // Overran: returns at once and restarts the schedule from now.
        assert!(ticker.wait(Duration::from_millis(20), &shutdown));
        let resumed = Instant::now();
        assert!(ticker.wait(Duration::from_millis(20), &shutdown));
        assert!(resumed.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn shutdown_wakes_waiting_ticker() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                let mut ticker = Ticker::start();
                let start = Instant::now();
                let running = ticker.wait(Duration::from_secs(30), &shutdown);
                (running, start.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();

        let (running, elapsed) = waiter.join().unwrap();
        assert!(!running);
        assert!(elapsed < Duration::from_secs(5));
        assert!(shutdown.is_triggered());
    }
}
