use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_telegram;
use crate::config::DEFAULT_TELEGRAM_SIZE;
use crate::error::{Result, TelegramError};

/// Writes framed telegrams to any `Write` stream.
///
/// Meter simulators and test rigs use this to produce the byte stream a
/// P1 port would emit.
pub struct TelegramWriter<T> {
    inner: T,
    buf: BytesMut,
    with_checksum: bool,
}

impl<T: Write> TelegramWriter<T> {
    /// Create a writer that appends a CRC to every telegram.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_TELEGRAM_SIZE),
            with_checksum: true,
        }
    }

    /// Choose whether telegrams carry a CRC (DSMR 2.x meters omit it).
    pub fn with_checksum(mut self, with_checksum: bool) -> Self {
        self.with_checksum = with_checksum;
        self
    }

    /// Frame `payload` and write it (blocking).
    ///
    /// Returns the number of bytes written.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        encode_telegram(payload, self.with_checksum, &mut self.buf)?;
        write_all_retry(&mut self.inner, &self.buf)?;
        self.inner.flush().map_err(TelegramError::Io)?;
        Ok(self.buf.len())
    }
}

fn write_all_retry<T: Write>(inner: &mut T, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match inner.write(data) {
            Ok(0) => {
                return Err(TelegramError::Io(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "failed to write telegram",
                )))
            }
            Ok(n) => data = &data[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TelegramError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumStatus;
    use crate::codec::{Telegram, TelegramDecoder};
    use crate::config::{ChecksumPolicy, ReaderConfig};

    #[test]
    fn writes_framed_telegram() {
        let mut wire = Vec::new();
        let written = TelegramWriter::new(&mut wire).send(b"XMX5").unwrap();

        assert_eq!(written, wire.len());
        assert!(wire.starts_with(b"/XMX5!"));
        assert!(wire.ends_with(b"\r\n"));

        let results = TelegramDecoder::new(ReaderConfig::default()).decode_all(&wire);
        assert!(results[0].is_ok());
    }

    #[test]
    fn writes_without_checksum() {
        let mut wire = Vec::new();
        let mut writer = TelegramWriter::new(&mut wire).with_checksum(false);
        writer.send(b"KFM5").unwrap();
        writer.send(b"A").unwrap();
        assert_eq!(wire, b"/KFM5!\r\n/A!\r\n");

        let config = ReaderConfig {
            checksum: ChecksumPolicy::Optional,
            ..ReaderConfig::default()
        };
        let results = TelegramDecoder::new(config).decode_all(&wire);
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Telegram::new(&b"/A!\r\n"[..], ChecksumStatus::Absent)
        );
    }

    #[test]
    fn interrupted_write_retries() {
        let mut link = InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        };
        TelegramWriter::new(&mut link).send(b"retry").unwrap();
        assert!(link.data.starts_with(b"/retry!"));
    }

    #[test]
    fn zero_length_write_is_an_error() {
        let mut writer = TelegramWriter::new(ZeroWriter);
        let err = writer.send(b"stuck").unwrap_err();
        assert!(matches!(err, TelegramError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
