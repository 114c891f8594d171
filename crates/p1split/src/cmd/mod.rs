use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use p1split_telegram::{ChecksumPolicy, ProtocolVersion};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod encode;
pub mod read;
pub mod run;
pub mod verify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the splitter: forward meter telegrams to every output.
    Run(RunArgs),
    /// Read telegrams from a meter link and print them.
    Read(ReadArgs),
    /// Check the telegrams in a captured byte stream.
    Verify(VerifyArgs),
    /// Frame a payload as a telegram.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Verify(args) => verify::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON splitter configuration.
    #[arg(long, short = 'c', value_name = "FILE", conflicts_with_all = ["input", "outputs"])]
    pub config: Option<PathBuf>,
    /// Meter serial device.
    #[arg(long, short = 'i', value_name = "DEVICE")]
    pub input: Option<PathBuf>,
    /// Consumer serial devices (repeat or comma-separate).
    #[arg(long = "output", short = 'o', value_name = "DEVICE", value_delimiter = ',')]
    pub outputs: Vec<PathBuf>,
    /// Meter DSMR version (2.0, 4.0, 4.2, 5.0).
    #[arg(long, default_value = "5.0", conflicts_with = "config")]
    pub protocol: ProtocolVersion,
    /// Do not drive the meter's request line.
    #[arg(long, conflicts_with = "config")]
    pub no_request_line: bool,
    /// Ignore the consumers' CTS lines and transmit unconditionally.
    #[arg(long, conflicts_with = "config")]
    pub no_flow_control: bool,
    /// Do not read console commands from stdin.
    #[arg(long)]
    pub no_console: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Meter serial device.
    #[arg(long, short = 'i', value_name = "DEVICE")]
    pub input: PathBuf,
    /// Exit after N telegrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Meter DSMR version (2.0, 4.0, 4.2, 5.0).
    #[arg(long, default_value = "5.0")]
    pub protocol: ProtocolVersion,
    /// Checksum policy (optional, required). Default follows the version.
    #[arg(long)]
    pub checksum: Option<ChecksumPolicy>,
    /// Deadline per telegram (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_timeout)]
    pub timeout: Duration,
    /// Do not drive the meter's request line.
    #[arg(long)]
    pub no_request_line: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Captured byte stream.
    pub capture: PathBuf,
    /// Checksum policy (optional, required).
    #[arg(long, default_value = "required")]
    pub checksum: ChecksumPolicy,
    /// Largest accepted telegram in bytes.
    #[arg(long, default_value_t = p1split_telegram::DEFAULT_TELEGRAM_SIZE)]
    pub telegram_size: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Read the payload from a file.
    #[arg(conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Payload text.
    #[arg(long)]
    pub data: Option<String>,
    /// Omit the CRC digits.
    #[arg(long)]
    pub no_checksum: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a telegram deadline: `<n>ms`, `<n>s` or bare seconds.
pub(crate) fn parse_timeout(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (digits, to_duration): (&str, fn(u64) -> Duration) =
        match input.strip_suffix("ms") {
            Some(ms) => (ms, Duration::from_millis),
            None => (input.strip_suffix('s').unwrap_or(input), Duration::from_secs),
        };
    match digits.parse::<u64>() {
        Ok(0) => Err("timeout must be greater than zero".to_string()),
        Ok(value) => Ok(to_duration(value)),
        Err(_) => Err(format!("expected e.g. 5s or 500ms, got {input:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_accepts_units() {
        assert_eq!(parse_timeout("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_timeout("150ms"), Ok(Duration::from_millis(150)));
        assert_eq!(parse_timeout(" 3 "), Ok(Duration::from_secs(3)));
    }

    #[test]
    fn timeout_rejects_zero_and_garbage() {
        assert!(parse_timeout("0ms").is_err());
        assert!(parse_timeout("5m").is_err());
        assert!(parse_timeout("").is_err());
        assert!(parse_timeout("-1s").is_err());
    }
}
