use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use p1split_link::{NullLine, SerialLink};
use p1split_telegram::{ReaderConfig, TelegramError, TelegramReader};
use tracing::{info, warn};

use crate::cmd::ReadArgs;
use crate::exit::{link_error, telegram_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_failure, print_telegram, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = ReaderConfig::for_version(args.protocol);
    config.read_timeout = args.timeout;
    if let Some(checksum) = args.checksum {
        config.checksum = checksum;
    }

    let link = SerialLink::open(&args.input, &args.protocol.serial_settings())
        .map_err(|err| link_error("open failed", err))?;
    let source = link.path().display().to_string();
    let reader = if args.no_request_line {
        TelegramReader::spawn(link, NullLine::default(), config)
    } else {
        let request = link
            .request_line()
            .map_err(|err| link_error("request line unavailable", err))?;
        TelegramReader::spawn(link, request, config)
    }
    .map_err(|err| telegram_error("reader setup failed", err))?;
    info!(input = %source, version = %args.protocol, "reading telegrams");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut index = 0usize;
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        index = index.saturating_add(1);
        match reader.read_telegram() {
            Ok(telegram) => {
                print_telegram(index, &telegram, &source, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(TelegramError::LinkClosed) => {
                return Err(telegram_error("read failed", TelegramError::LinkClosed))
            }
            Err(err) => {
                warn!(error = %err, "telegram read failed");
                print_failure(index, &err, &source, format);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
