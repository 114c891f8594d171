use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use p1split_link::ControlLine;
use tracing::{debug, info, trace, warn};

use crate::assembler::{Feed, FrameAssembler, FrameInfo};
use crate::checksum::ChecksumStatus;
use crate::codec::Telegram;
use crate::config::ReaderConfig;
use crate::error::{Result, TelegramError};

const PUMP_CHUNK_SIZE: usize = 256;

/// Reader to link pump.
enum Command {
    /// Start assembling into `buf`, storing at most `capacity` bytes.
    Arm {
        seq: u64,
        buf: Vec<u8>,
        capacity: usize,
    },
    /// Give up on read `seq` if it is still outstanding.
    Disarm { seq: u64 },
}

/// Link pump to reader. Every `Arm` is answered by exactly one reply,
/// which hands the buffer back.
struct Reply {
    seq: u64,
    buf: Vec<u8>,
    /// `None` if the read was cancelled before completing.
    frame: Option<FrameInfo>,
}

/// Reads validated telegrams from an inbound link.
///
/// Bytes are pulled off the link by a dedicated pump thread that owns the
/// framing state machine. [`TelegramReader::read`] arms the machine, raises
/// the request line and waits for the pump to report a complete telegram or
/// for the read deadline to pass. Only one read is outstanding at a time;
/// concurrent callers queue on an internal lock.
///
/// The link should return `TimedOut`/`WouldBlock` periodically when quiet
/// (serial devices do so via their read timeout), so cancelled reads hand
/// their buffer back promptly.
pub struct TelegramReader {
    config: ReaderConfig,
    side: Mutex<ReadSide>,
}

struct ReadSide {
    commands: Sender<Command>,
    replies: Receiver<Reply>,
    spare: Option<Vec<u8>>,
    next_seq: u64,
    request: Box<dyn ControlLine>,
}

impl TelegramReader {
    /// Start a reader on `link`, using `request` as the meter's request line.
    ///
    /// Pass [`p1split_link::NullLine`] when the request line is hard-wired.
    pub fn spawn<L, R>(link: L, request: R, config: ReaderConfig) -> Result<Self>
    where
        L: Read + Send + 'static,
        R: ControlLine + 'static,
    {
        let mut request: Box<dyn ControlLine> = Box::new(request);
        request
            .set_asserted(false)
            .map_err(|err| TelegramError::Init(Box::new(err)))?;

        let (commands, command_rx) = mpsc::channel();
        let (reply_tx, replies) = mpsc::channel();

        std::thread::Builder::new()
            .name("p1-link-pump".to_string())
            .spawn(move || run_pump(link, command_rx, reply_tx))
            .map_err(|err| TelegramError::Init(Box::new(err)))?;

        info!(
            checksum = ?config.checksum,
            read_timeout = ?config.read_timeout,
            telegram_size = config.telegram_size,
            "telegram reader started"
        );

        Ok(Self {
            side: Mutex::new(ReadSide {
                commands,
                replies,
                spare: Some(vec![0; config.telegram_size]),
                next_seq: 0,
                request,
            }),
            config,
        })
    }

    /// Read one telegram into `out`.
    ///
    /// Returns the total number of bytes written, markers, checksum and line
    /// terminator included. `out` is only written on success.
    pub fn read(&self, out: &mut [u8]) -> Result<usize> {
        self.read_checked(out).map(|(len, _)| len)
    }

    /// Read one telegram into a freshly allocated [`Telegram`].
    pub fn read_telegram(&self) -> Result<Telegram> {
        let mut out = vec![0; self.config.telegram_size];
        let (len, status) = self.read_checked(&mut out)?;
        out.truncate(len);
        Ok(Telegram::new(out, status))
    }

    /// Reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    fn read_checked(&self, out: &mut [u8]) -> Result<(usize, ChecksumStatus)> {
        let mut side = self.side.lock().unwrap_or_else(PoisonError::into_inner);
        side.reclaim();

        let mut buf = side.spare.take().unwrap_or_default();
        if buf.len() < out.len() {
            buf.resize(out.len(), 0);
        }

        let seq = side.next_seq;
        side.next_seq = side.next_seq.wrapping_add(1);
        side.commands
            .send(Command::Arm {
                seq,
                buf,
                capacity: out.len(),
            })
            .map_err(|_| TelegramError::LinkClosed)?;

        side.set_request(true);
        let reply = side.wait_reply(seq, self.config.read_timeout);
        side.set_request(false);

        let Some(Reply { buf, frame, .. }) = reply? else {
            // The pump answers the disarm with the buffer; the next read
            // picks it up.
            let _ = side.commands.send(Command::Disarm { seq });
            debug!(seq, timeout = ?self.config.read_timeout, "telegram read timed out");
            return Err(TelegramError::Timeout(self.config.read_timeout));
        };

        let result = match frame {
            Some(info) => info.validate(&buf, self.config.checksum).map(|status| {
                out[..info.len].copy_from_slice(&buf[..info.len]);
                (info.len, status)
            }),
            None => Err(TelegramError::Timeout(self.config.read_timeout)),
        };
        side.spare = Some(buf);

        match &result {
            Ok((len, status)) => debug!(seq, len, checksum = ?status, "telegram read"),
            Err(err) => debug!(seq, error = %err, "telegram rejected"),
        }
        result
    }
}

impl ReadSide {
    /// Collect buffers from reads that timed out earlier.
    fn reclaim(&mut self) {
        while let Ok(reply) = self.replies.try_recv() {
            trace!(seq = reply.seq, "reclaimed buffer of abandoned read");
            self.recycle(reply.buf);
        }
    }

    fn recycle(&mut self, buf: Vec<u8>) {
        if self.spare.is_none() {
            self.spare = Some(buf);
        }
    }

    fn wait_reply(&mut self, seq: u64, timeout: Duration) -> Result<Option<Reply>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => return Ok(Some(reply)),
                Ok(stale) => self.recycle(stale.buf),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(TelegramError::LinkClosed),
            }
        }
    }

    fn set_request(&mut self, asserted: bool) {
        if let Err(err) = self.request.set_asserted(asserted) {
            warn!(error = %err, asserted, "failed to drive request line");
        }
    }
}

impl std::fmt::Debug for TelegramReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramReader")
            .field("config", &self.config)
            .finish()
    }
}

/// Body of the link pump thread.
///
/// Owns the framing state machine: bytes are pushed into it without any
/// locking, and the only hand-off with the reader is the command/reply
/// channel pair.
fn run_pump<L: Read>(mut link: L, commands: Receiver<Command>, replies: Sender<Reply>) {
    let mut assembler = FrameAssembler::default();
    let mut armed: Option<u64> = None;
    let mut chunk = [0u8; PUMP_CHUNK_SIZE];

    loop {
        let read = link.read(&mut chunk);

        // Commands are applied after the link read returns and before its
        // bytes are fed, so bytes provoked by a request are never missed.
        loop {
            match commands.try_recv() {
                Ok(Command::Arm { seq, buf, capacity }) => {
                    if let Some(previous) = armed.take() {
                        cancel(&mut assembler, previous, &replies);
                    }
                    drop(assembler.replace_buffer(buf));
                    assembler.arm(capacity);
                    armed = Some(seq);
                    trace!(seq, capacity, "read armed");
                }
                Ok(Command::Disarm { seq }) => {
                    if armed == Some(seq) {
                        armed = None;
                        cancel(&mut assembler, seq, &replies);
                        trace!(seq, "read disarmed");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("telegram reader dropped, stopping link pump");
                    return;
                }
            }
        }

        let n = match read {
            Ok(0) => {
                warn!("inbound link closed");
                return;
            }
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!(error = %err, "inbound link failed");
                return;
            }
        };

        for &byte in &chunk[..n] {
            if assembler.push(byte) != Feed::Complete {
                continue;
            }
            let frame = assembler.frame_info();
            let buf = assembler.replace_buffer(Vec::new());
            assembler.reset();
            if let Some(seq) = armed.take() {
                trace!(seq, "telegram complete");
                if replies.send(Reply { seq, buf, frame }).is_err() {
                    return;
                }
            }
        }
    }
}

fn cancel(assembler: &mut FrameAssembler, seq: u64, replies: &Sender<Reply>) {
    let buf = assembler.replace_buffer(Vec::new());
    assembler.reset();
    let _ = replies.send(Reply {
        seq,
        buf,
        frame: None,
    });
}
