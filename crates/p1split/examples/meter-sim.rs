//! Meter simulator: writes a telegram every second.
//!
//! Run with:
//!   cargo run --example meter-sim -- /dev/ttyUSB0
//!
//! An optional third argument picks the DSMR version (default 5.0). It sets
//! the line settings, and 2.0 telegrams go out without a CRC:
//!   cargo run --example meter-sim -- /dev/ttyUSB0 10 2.0
//!
//! Without a device argument telegrams go to stdout, which is handy for
//! producing captures:
//!   cargo run --example meter-sim -- - 3 > capture.bin
//!   cargo run --features cli -- verify capture.bin

use std::io::Write;
use std::thread;
use std::time::Duration;

use p1split::link::SerialLink;
use p1split::telegram::{ChecksumPolicy, ProtocolVersion, TelegramWriter};

fn payload(sequence: u64) -> String {
    let delivered = 123_456 + sequence * 7;
    format!(
        "ISK5\\2M550T-1012\r\n\r\n\
         1-3:0.2.8(50)\r\n\
         0-0:96.1.1(4530303034303031353934373534343134)\r\n\
         1-0:1.8.1({:06}.{:03}*kWh)\r\n\
         1-0:1.7.0(00.{:03}*kW)\r\n",
        delivered / 1000,
        delivered % 1000,
        sequence % 1000
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "-".to_string());
    let count: Option<u64> = args.next().map(|n| n.parse()).transpose()?;
    let version: ProtocolVersion = args.next().as_deref().unwrap_or("5.0").parse()?;

    let out: Box<dyn Write> = if device == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(SerialLink::open(&device, &version.serial_settings())?)
    };
    let mut writer = TelegramWriter::new(out)
        .with_checksum(version.default_checksum() == ChecksumPolicy::Required);
    eprintln!("Simulating DSMR {version} meter on {device}");

    let mut sequence = 0u64;
    while count.is_none_or(|count| sequence < count) {
        let written = writer.send(payload(sequence).as_bytes())?;
        eprintln!("Sent telegram {sequence} ({written} bytes)");
        sequence += 1;
        if count != Some(sequence) {
            thread::sleep(Duration::from_secs(1));
        }
    }
    Ok(())
}
