use p1split_telegram::{ReaderConfig, TelegramDecoder};
use tracing::debug;

use crate::cmd::VerifyArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_failure, print_telegram, OutputFormat};

pub fn run(args: VerifyArgs, format: OutputFormat) -> CliResult<i32> {
    if args.telegram_size == 0 {
        return Err(CliError::new(USAGE, "telegram size must be greater than zero"));
    }
    let capture = std::fs::read(&args.capture).map_err(|err| {
        io_error(&format!("failed to read {}", args.capture.display()), err)
    })?;
    let source = args.capture.display().to_string();

    let mut decoder = TelegramDecoder::new(ReaderConfig {
        checksum: args.checksum,
        telegram_size: args.telegram_size,
        ..ReaderConfig::default()
    });
    let results = decoder.decode_all(&capture);
    debug!(bytes = capture.len(), telegrams = results.len(), "capture decoded");

    if results.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no complete telegram in {source}"),
        ));
    }

    let mut failed = 0usize;
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(telegram) => print_telegram(index + 1, telegram, &source, format),
            Err(err) => {
                failed += 1;
                print_failure(index + 1, err, &source, format);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{failed} of {} telegrams failed verification", results.len()),
        ));
    }
    Ok(SUCCESS)
}
