//! Serial link abstraction for P1 telegram splitting.
//!
//! Provides the byte links and discrete control lines the splitter runs on:
//! - Serial data lines (any `Read`/`Write`, real devices via [`SerialLink`])
//! - Request-to-send output lines ([`ControlLine`])
//! - Flow-control input lines ([`FlowInput`])
//!
//! This is the lowest layer of p1split. Everything else builds on top of
//! the traits and types provided here.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{LinkError, Result};
pub use serial::{CtsInput, Parity, RtsLine, SerialLink, SerialSettings};
pub use traits::{ControlLine, FlowInput, NullLine};
