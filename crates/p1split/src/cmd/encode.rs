use std::io::Read;

use bytes::BytesMut;

use crate::cmd::EncodeArgs;
use crate::exit::{io_error, telegram_error, CliResult, SUCCESS};
use crate::output::print_raw;

/// Write the framed telegram to stdout. Without `--data` or a file the
/// payload comes from stdin.
pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = match (args.data, args.file) {
        (Some(data), _) => data.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)
            .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed to read stdin", err))?;
            buf
        }
    };

    let mut out = BytesMut::new();
    p1split_telegram::encode_telegram(&payload, !args.no_checksum, &mut out)
        .map_err(|err| telegram_error("encode failed", err))?;
    print_raw(&out);
    Ok(SUCCESS)
}
