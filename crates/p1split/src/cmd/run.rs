use std::io::{BufRead, ErrorKind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use p1split_fanout::{Splitter, SplitterConfig};
use tracing::{debug, info, warn};

use crate::cmd::RunArgs;
use crate::exit::{splitter_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

const IDLE_WAKE: Duration = Duration::from_secs(60);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;
    let handle =
        p1split_fanout::open(&config).map_err(|err| splitter_error("splitter start failed", err))?;
    let splitter = Arc::clone(handle.splitter());

    install_ctrlc_handler(Arc::clone(&splitter))?;
    if !args.no_console {
        spawn_console(Arc::clone(&splitter), format)?;
    }

    while !splitter.shutdown().wait_until(Instant::now() + IDLE_WAKE) {}

    info!("stopping splitter");
    handle.stop();
    Ok(SUCCESS)
}

/// Build the configuration from `--config` or from the device flags.
fn load_config(args: &RunArgs) -> CliResult<SplitterConfig> {
    if let Some(path) = &args.config {
        return SplitterConfig::from_file(path)
            .map_err(|err| splitter_error("config load failed", err));
    }

    let Some(input) = &args.input else {
        return Err(CliError::new(
            USAGE,
            "either --config or --input with at least one --output is required",
        ));
    };
    let mut config = SplitterConfig::for_devices(input, &args.outputs);
    config.input.version = args.protocol;
    config.input.request_line = !args.no_request_line;
    for output in &mut config.outputs {
        output.flow_control = !args.no_flow_control;
    }
    config
        .validate()
        .map_err(|err| splitter_error("invalid arguments", err))?;
    Ok(config)
}

/// Read console commands from stdin until it closes.
///
/// The thread is not joined; it ends with the process.
fn spawn_console(splitter: Arc<Splitter>, format: OutputFormat) -> CliResult<()> {
    std::thread::Builder::new()
        .name("p1-console".to_string())
        .spawn(move || run_console(std::io::stdin().lock(), &splitter, format))
        .map(|_| ())
        .map_err(|err| CliError::new(INTERNAL, format!("console thread failed: {err}")))
}

/// Execute one command per input line. Lines that are not valid UTF-8
/// are decoded lossily and rejected by the parser like any other typo.
fn run_console<R: BufRead>(mut input: R, splitter: &Splitter, format: OutputFormat) {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match input.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "console input failed");
                break;
            }
        }
        let line = String::from_utf8_lossy(&raw);
        match splitter.execute_line(&line) {
            Ok(Some(reply)) => print_reply(&reply, format),
            Ok(None) => {}
            Err(err) => eprintln!("error: {err}"),
        }
    }
    debug!("console input closed");
}

fn install_ctrlc_handler(splitter: Arc<Splitter>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        splitter.shutdown().trigger();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use p1split_fanout::{ReceiverPort, SenderPort, TelegramSource};
    use p1split_telegram::{ProtocolVersion, TelegramError};

    use super::*;
    use crate::exit::DATA_INVALID;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            input: None,
            outputs: Vec::new(),
            protocol: ProtocolVersion::Dsmr5,
            no_request_line: false,
            no_flow_control: false,
            no_console: false,
        }
    }

    #[test]
    fn device_flags_build_config() {
        let args = RunArgs {
            input: Some(PathBuf::from("/dev/ttyUSB0")),
            outputs: vec![PathBuf::from("/dev/ttyUSB1"), PathBuf::from("/dev/ttyUSB2")],
            protocol: ProtocolVersion::Dsmr42,
            no_flow_control: true,
            ..args()
        };
        let config = load_config(&args).unwrap();

        assert_eq!(config.input.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.input.version, ProtocolVersion::Dsmr42);
        assert!(config.input.request_line);
        assert_eq!(config.outputs.len(), 2);
        assert!(config.outputs.iter().all(|o| !o.flow_control));
    }

    #[test]
    fn missing_input_is_usage_error() {
        let err = load_config(&args()).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_outputs_is_usage_error() {
        let args = RunArgs {
            input: Some(PathBuf::from("/dev/ttyUSB0")),
            ..args()
        };
        let err = load_config(&args).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("at least one output"));
    }

    #[test]
    fn malformed_config_file_is_data_invalid() {
        let path = std::env::temp_dir().join(format!("p1split-run-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let args = RunArgs {
            config: Some(path.clone()),
            ..args()
        };
        let err = load_config(&args).unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert_eq!(err.code, DATA_INVALID);
    }

    /// Source for a meter that never answers.
    struct Silent;

    impl TelegramSource for Silent {
        fn read_into(&self, _out: &mut [u8]) -> Result<usize, TelegramError> {
            Err(TelegramError::Timeout(Duration::from_millis(1)))
        }
    }

    fn splitter() -> Splitter {
        let receiver = ReceiverPort::new(Box::new(Silent), 64, true, Duration::from_secs(1));
        let senders = (1..=2)
            .map(|port| SenderPort::new(port, 64, true, Duration::from_secs(1)))
            .collect();
        Splitter::new(receiver, senders)
    }

    #[test]
    fn console_keeps_reading_after_invalid_utf8() {
        let splitter = splitter();
        let input = Cursor::new(b"disable 1\n\xff\xfe enable\ninterval 2 250\r\n".to_vec());

        run_console(input, &splitter, OutputFormat::Pretty);

        assert!(!splitter.sender(1).unwrap().control().is_enabled());
        assert_eq!(
            splitter.sender(2).unwrap().control().interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn console_runs_last_line_without_newline() {
        let splitter = splitter();
        run_console(Cursor::new(b"disable 0".to_vec()), &splitter, OutputFormat::Pretty);
        assert!(!splitter.receiver().control().is_enabled());
    }
}
