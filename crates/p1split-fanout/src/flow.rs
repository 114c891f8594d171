use std::time::{Duration, Instant};

use p1split_link::FlowInput;
use tracing::{debug, warn};

use crate::schedule::Shutdown;
use crate::sender::SenderPort;

/// Default flow input sampling period.
pub const DEFAULT_FLOW_POLL: Duration = Duration::from_millis(5);

/// Turns a sampled flow-control input into level-change events.
///
/// Serial ports expose CTS as a level, not an interrupt, so the watcher
/// samples it and calls [`SenderPort::on_flow_level`] whenever it changes.
/// The first sample only sets the initial level; it is not a request.
pub struct FlowWatcher<F> {
    input: F,
    last: Option<bool>,
    failing: bool,
}

impl<F: FlowInput> FlowWatcher<F> {
    pub fn new(input: F) -> Self {
        Self {
            input,
            last: None,
            failing: false,
        }
    }

    /// Sample once and report a change to `port`. Returns the level.
    ///
    /// A failed sample keeps the previous level (deasserted before the
    /// first good sample).
    pub fn poll(&mut self, port: &SenderPort) -> bool {
        match self.input.is_asserted() {
            Ok(level) => {
                self.failing = false;
                match self.last {
                    None => {
                        port.set_flow_level(level);
                        debug!(port = port.port(), asserted = level, "initial flow level");
                    }
                    Some(last) if last != level => {
                        port.on_flow_level(level);
                        debug!(port = port.port(), asserted = level, "flow level changed");
                    }
                    Some(_) => {}
                }
                self.last = Some(level);
            }
            Err(err) => {
                if !self.failing {
                    warn!(port = port.port(), error = %err, "failed to sample flow input");
                }
                self.failing = true;
            }
        }
        self.last.unwrap_or(false)
    }

    /// Sample every `period` until shutdown.
    pub fn run(mut self, port: &SenderPort, period: Duration, shutdown: &Shutdown) {
        loop {
            self.poll(port);
            if shutdown.wait_until(Instant::now() + period) {
                return;
            }
        }
    }
}
