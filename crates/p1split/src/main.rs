mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "p1split",
    version,
    about = "Split a DSMR P1 telegram stream across serial consumers"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Defaults to info for `run`, warn otherwise.
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let level = cli
        .log_level
        .unwrap_or_else(|| LogLevel::default_for(matches!(cli.command, Command::Run(_))));
    init_logging(cli.log_format, level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_devices() {
        let cli = Cli::try_parse_from([
            "p1split",
            "run",
            "--input",
            "/dev/ttyUSB0",
            "--output",
            "/dev/ttyUSB1,/dev/ttyUSB2",
            "--output",
            "/dev/ttyUSB3",
            "--protocol",
            "4.2",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.outputs.len(), 3);
        assert_eq!(args.protocol, p1split_telegram::ProtocolVersion::Dsmr42);
    }

    #[test]
    fn rejects_config_with_device_flags() {
        let err = Cli::try_parse_from([
            "p1split",
            "run",
            "--config",
            "splitter.json",
            "--input",
            "/dev/ttyUSB0",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_unknown_protocol() {
        let err = Cli::try_parse_from([
            "p1split",
            "read",
            "--input",
            "/dev/ttyUSB0",
            "--protocol",
            "3.0",
        ])
        .expect_err("unknown version should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_read_with_checksum_policy() {
        let cli = Cli::try_parse_from([
            "p1split",
            "read",
            "--input",
            "/dev/ttyUSB0",
            "--checksum",
            "optional",
            "--timeout",
            "500ms",
            "--count",
            "2",
        ])
        .expect("read args should parse");
        let Command::Read(args) = cli.command else {
            panic!("expected read");
        };
        assert_eq!(
            args.checksum,
            Some(p1split_telegram::ChecksumPolicy::Optional)
        );
        assert_eq!(args.count, Some(2));
        assert_eq!(args.timeout, std::time::Duration::from_millis(500));
    }

    #[test]
    fn log_level_is_unset_unless_given() {
        let cli = Cli::try_parse_from(["p1split", "verify", "capture.bin"]).unwrap();
        assert_eq!(cli.log_level, None);

        let cli =
            Cli::try_parse_from(["p1split", "verify", "capture.bin", "--log-level", "off"]).unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Off));
    }

    #[test]
    fn rejects_zero_read_timeout() {
        let err = Cli::try_parse_from([
            "p1split",
            "read",
            "--input",
            "/dev/ttyUSB0",
            "--timeout",
            "0s",
        ])
        .expect_err("zero timeout should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_verify_subcommand() {
        let cli = Cli::try_parse_from(["p1split", "verify", "capture.bin", "--format", "pretty"])
            .expect("verify args should parse");
        assert!(matches!(cli.command, Command::Verify(_)));
    }
}
