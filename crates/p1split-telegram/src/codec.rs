use bytes::{BufMut, Bytes, BytesMut};

use crate::assembler::{Feed, FrameAssembler};
use crate::checksum::{crc16, format_checksum, ChecksumStatus};
use crate::config::ReaderConfig;
use crate::error::{Result, TelegramError};
use crate::markers::{CARRIAGE_RETURN, CHECKSUM_DIGITS, END_MARKER, LINE_FEED, START_MARKER};

/// A complete, validated telegram.
///
/// Frozen once assembled; cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    raw: Bytes,
    checksum: ChecksumStatus,
}

impl Telegram {
    /// Wrap raw telegram bytes that have already been validated.
    pub fn new(raw: impl Into<Bytes>, checksum: ChecksumStatus) -> Self {
        Self {
            raw: raw.into(),
            checksum,
        }
    }

    /// All bytes, from the start marker through the line terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The underlying shared bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.raw
    }

    /// Total wire length (markers, checksum and terminator included).
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the telegram holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Checksum status established during validation.
    pub fn checksum(&self) -> ChecksumStatus {
        self.checksum
    }

    /// The bytes between the start and end markers.
    pub fn payload(&self) -> &[u8] {
        let raw: &[u8] = &self.raw;
        let body = raw.strip_prefix(&[START_MARKER]).unwrap_or(raw);
        match body.iter().position(|&b| b == END_MARKER) {
            Some(end) => &body[..end],
            None => body,
        }
    }
}

/// Encode a telegram into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────┬───────────────┬─────┬────────────────────┬────────┐
/// │ '/' │ payload       │ '!' │ CRC (4 hex digits) │ CR LF  │
/// │     │ (no '!')      │     │ optional           │        │
/// └─────┴───────────────┴─────┴────────────────────┴────────┘
/// ```
///
/// The CRC covers everything from `/` through `!` inclusive.
pub fn encode_telegram(payload: &[u8], with_checksum: bool, dst: &mut BytesMut) -> Result<()> {
    if let Some(offset) = payload.iter().position(|&b| b == END_MARKER) {
        return Err(TelegramError::EndMarkerInPayload { offset });
    }

    let start = dst.len();
    dst.reserve(payload.len() + CHECKSUM_DIGITS + 4);
    dst.put_u8(START_MARKER);
    dst.put_slice(payload);
    dst.put_u8(END_MARKER);
    if with_checksum {
        let crc = crc16(&dst[start..]);
        dst.put_slice(&format_checksum(crc));
    }
    dst.put_u8(CARRIAGE_RETURN);
    dst.put_u8(LINE_FEED);
    Ok(())
}

/// Decodes telegrams from a captured byte stream.
///
/// Runs the same state machine as the live reader, re-arming itself after
/// every telegram, so bytes between telegrams are skipped.
#[derive(Debug)]
pub struct TelegramDecoder {
    assembler: FrameAssembler,
    config: ReaderConfig,
}

impl TelegramDecoder {
    /// Create a decoder with the given reader configuration.
    pub fn new(config: ReaderConfig) -> Self {
        let mut assembler = FrameAssembler::new(vec![0; config.telegram_size]);
        assembler.arm(config.telegram_size);
        Self { assembler, config }
    }

    /// Feed one byte; yields a result each time a telegram completes.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Telegram>> {
        if self.assembler.push(byte) != Feed::Complete {
            return None;
        }

        let result = self.assembler.frame_info().map(|info| {
            let bytes = self.assembler.as_bytes();
            info.validate(bytes, self.config.checksum)
                .map(|status| Telegram::new(Bytes::copy_from_slice(bytes), status))
        });
        self.assembler.reset();
        self.assembler.arm(self.config.telegram_size);
        result
    }

    /// Decode every complete telegram in `input`.
    ///
    /// A trailing partial telegram is kept and completed by later input.
    pub fn decode_all(&mut self, input: &[u8]) -> Vec<Result<Telegram>> {
        input.iter().filter_map(|&byte| self.feed(byte)).collect()
    }
}
