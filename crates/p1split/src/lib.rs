//! Split one DSMR P1 telegram stream into several consumer links.
//!
//! p1split reads telegrams from a smart meter's P1 port, verifies them and
//! hands a copy to every downstream consumer, each pulling at its own pace
//! under hardware flow control.
//!
//! # Crate Structure
//!
//! - [`link`] - Serial links and modem control lines
//! - [`telegram`] - Telegram framing, CRC-16 validation and the telegram reader
//! - [`fanout`] - Receiver and sender ports, the splitter and its console (behind `fanout` feature)

/// Re-export link types.
pub mod link {
    pub use p1split_link::*;
}

/// Re-export telegram types.
pub mod telegram {
    pub use p1split_telegram::*;
}

/// Re-export fan-out types (requires `fanout` feature).
#[cfg(feature = "fanout")]
pub mod fanout {
    pub use p1split_fanout::*;
}
