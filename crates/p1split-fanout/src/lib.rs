//! Fan-out of P1 telegrams to multiple consumers.
//!
//! One receiver port reads validated telegrams and copies each into the
//! slot ring of every sender port. Each sender drains its newest slot to its
//! own link while the consumer holds its request line asserted. A busy or
//! stalled consumer never blocks the receiver or the other consumers.

pub mod config;
pub mod control;
pub mod counters;
pub mod error;
pub mod flow;
pub mod receiver;
pub mod schedule;
pub mod sender;
pub mod slot;
pub mod splitter;

pub use config::{InputConfig, OutputConfig, PortSettings, SplitterConfig};
pub use control::{Command, Reply, COMMANDS};
pub use counters::{ReceiverStats, SenderStats, SplitterStats};
pub use error::{ControlError, Result, SplitterError};
pub use flow::{FlowWatcher, DEFAULT_FLOW_POLL};
pub use receiver::{ReceiverPort, TelegramSource};
pub use schedule::{PortControl, Shutdown, Ticker, DEFAULT_INTERVAL};
pub use sender::{SenderPort, Transmit};
pub use slot::{BufferSlot, SlotData, SlotRing, RING_DEPTH};
pub use splitter::{open, start, SenderLink, Splitter, SplitterHandle};
