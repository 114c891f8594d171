//! Telegram framing bytes.
//!
//! A telegram on the wire looks like `/<payload>!<CRC>\r\n`, where the
//! four-digit CRC is optional on older meters.

/// Start of a telegram.
pub const START_MARKER: u8 = b'/';

/// End of the telegram body; the checksum line follows.
pub const END_MARKER: u8 = b'!';

/// Optional byte before the final line feed.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Completes a telegram.
pub const LINE_FEED: u8 = b'\n';

/// Number of ASCII-hex digits in a checksum.
pub const CHECKSUM_DIGITS: usize = 4;
