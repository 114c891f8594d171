//! CRC-16 telegram checksums.
//!
//! DSMR uses CRC-16/ARC: reflected polynomial 0xA001, seed 0x0000, computed
//! over every byte from the start marker through the end marker inclusive,
//! and rendered as four uppercase hex digits after the end marker.

use crate::config::ChecksumPolicy;
use crate::error::{Result, TelegramError};
use crate::markers::{CARRIAGE_RETURN, CHECKSUM_DIGITS, LINE_FEED};

/// Reflected CRC-16 polynomial.
pub const CHECKSUM_POLY: u16 = 0xA001;

/// CRC-16 seed.
pub const CHECKSUM_SEED: u16 = 0x0000;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CHECKSUM_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-16 of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CHECKSUM_SEED, |crc, &byte| {
        (crc >> 8) ^ TABLE[usize::from((crc ^ u16::from(byte)) & 0x00FF)]
    })
}

/// Outcome of a successful checksum verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// The telegram carried this checksum and it matched.
    Verified(u16),
    /// The telegram carried no checksum and the policy allowed that.
    Absent,
}

/// Parse exactly four ASCII-hex digits.
pub fn parse_checksum(digits: &[u8]) -> Option<u16> {
    if digits.len() != CHECKSUM_DIGITS {
        return None;
    }
    digits.iter().try_fold(0u16, |acc, &digit| {
        let nibble = char::from(digit).to_digit(16)?;
        Some((acc << 4) | nibble as u16)
    })
}

/// Render a checksum as four uppercase hex digits.
pub fn format_checksum(crc: u16) -> [u8; CHECKSUM_DIGITS] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    [
        HEX[usize::from(crc >> 12)],
        HEX[usize::from((crc >> 8) & 0xF)],
        HEX[usize::from((crc >> 4) & 0xF)],
        HEX[usize::from(crc & 0xF)],
    ]
}

/// Verify the checksum of a complete telegram.
///
/// `end_marker` is the offset of `!` in `telegram`. Everything after it up
/// to the line break is the checksum line, which must be empty or exactly
/// four hex digits.
pub fn verify(telegram: &[u8], end_marker: usize, policy: ChecksumPolicy) -> Result<ChecksumStatus> {
    let Some(line) = telegram.get(end_marker + 1..) else {
        return Err(TelegramError::ChecksumMalformed);
    };
    let line = line.strip_suffix(&[LINE_FEED]).unwrap_or(line);
    let line = line.strip_suffix(&[CARRIAGE_RETURN]).unwrap_or(line);

    if line.is_empty() {
        return match policy {
            ChecksumPolicy::Required => Err(TelegramError::ChecksumMissing),
            ChecksumPolicy::Optional => Ok(ChecksumStatus::Absent),
        };
    }

    let expected = parse_checksum(line).ok_or(TelegramError::ChecksumMalformed)?;
    let computed = crc16(&telegram[..=end_marker]);

    if expected != computed {
        return Err(TelegramError::ChecksumMismatch { expected, computed });
    }

    Ok(ChecksumStatus::Verified(computed))
}
