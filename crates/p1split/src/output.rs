use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use p1split_fanout::{Reply, SplitterStats};
use p1split_telegram::{ChecksumStatus, Telegram, TelegramError};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct TelegramOutput<'a> {
    index: usize,
    status: &'static str,
    size: usize,
    checksum: Option<String>,
    telegram: String,
    source: &'a str,
    timestamp: String,
}

#[derive(Serialize)]
struct FailureOutput<'a> {
    index: usize,
    status: &'static str,
    kind: &'static str,
    error: String,
    source: &'a str,
    timestamp: String,
}

/// Print one decoded telegram. `index` counts from 1.
pub fn print_telegram(index: usize, telegram: &Telegram, source: &str, format: OutputFormat) {
    let checksum = checksum_text(telegram.checksum());
    match format {
        OutputFormat::Json => {
            let out = TelegramOutput {
                index,
                status: "ok",
                size: telegram.len(),
                checksum: checksum.clone(),
                telegram: text_preview(telegram.as_bytes()),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "CRC", "SOURCE"])
                .add_row(vec![
                    index.to_string(),
                    telegram.len().to_string(),
                    checksum.unwrap_or_else(|| "-".to_string()),
                    source.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "telegram={} size={} crc={} source={}",
                index,
                telegram.len(),
                checksum.unwrap_or_else(|| "none".to_string()),
                source
            );
        }
        OutputFormat::Raw => print_raw(telegram.as_bytes()),
    }
}

/// Report a telegram that failed to read or validate.
///
/// Raw output keeps stdout clean and reports on stderr instead.
pub fn print_failure(index: usize, err: &TelegramError, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FailureOutput {
                index,
                status: "failed",
                kind: kind_name(err),
                error: err.to_string(),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("telegram={index} failed ({}): {err}", kind_name(err));
        }
        OutputFormat::Raw => eprintln!("telegram {index} failed: {err}"),
    }
}

pub fn print_stats(stats: &SplitterStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let r = &stats.receiver;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "PORT", "ROLE", "ENABLED", "INTERVAL", "BUFFERED", "OK", "FAILED", "DETAIL",
                ])
                .add_row(vec![
                    "0".to_string(),
                    "receiver".to_string(),
                    yes_no(r.enabled).to_string(),
                    format!("{} ms", r.interval_ms),
                    r.buffered.to_string(),
                    r.read.to_string(),
                    (r.failed_timeout + r.failed_checksum + r.failed_other).to_string(),
                    format!(
                        "timeout={} checksum={} other={}",
                        r.failed_timeout, r.failed_checksum, r.failed_other
                    ),
                ]);
            for s in &stats.senders {
                table.add_row(vec![
                    s.port.to_string(),
                    "sender".to_string(),
                    yes_no(s.enabled).to_string(),
                    format!("{} ms", s.interval_ms),
                    s.buffered[s.current].to_string(),
                    s.written.to_string(),
                    s.aborted.to_string(),
                    format!(
                        "rts={} copied={} requested={}",
                        yes_no(s.request_to_send),
                        s.copied,
                        s.requested
                    ),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => print!("{stats}"),
    }
}

/// Print a console reply. `Done` prints nothing.
pub fn print_reply(reply: &Reply, format: OutputFormat) {
    match reply {
        Reply::Done => {}
        Reply::Dump(bytes) => {
            print_raw(bytes);
            if !bytes.ends_with(b"\n") {
                println!();
            }
        }
        Reply::Stats(stats) => print_stats(stats, format),
        Reply::Help(commands) => {
            for (name, description) in commands.iter() {
                println!("{name:<10} {description}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn kind_name(err: &TelegramError) -> &'static str {
    match err.kind() {
        p1split_telegram::ErrorKind::Init => "init",
        p1split_telegram::ErrorKind::Timeout => "timeout",
        p1split_telegram::ErrorKind::Checksum => "checksum",
        p1split_telegram::ErrorKind::Other => "other",
    }
}

fn checksum_text(status: ChecksumStatus) -> Option<String> {
    match status {
        ChecksumStatus::Verified(crc) => Some(format!("{crc:04X}")),
        ChecksumStatus::Absent => None,
    }
}

fn text_preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", bytes.len()),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
