use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::traits::{ControlLine, FlowInput};

/// Default read timeout on serial devices.
///
/// Reads return `TimedOut` after this long without data, which keeps
/// threads blocked on a quiet line responsive.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Parity setting for a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Line settings for a serial device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate. Default: 115200 (DSMR 5).
    pub baud_rate: u32,
    /// Data bits (5-8). Default: 8.
    pub data_bits: u8,
    /// Parity. Default: none.
    pub parity: Parity,
    /// Read timeout for blocking reads.
    #[serde(with = "millis")]
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// 115200 baud, 8N1: DSMR 5 meters.
    pub fn dsmr5() -> Self {
        Self::default()
    }

    /// 9600 baud, 7E1: DSMR 2.x and 4.x meters.
    pub fn dsmr4() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 7,
            parity: Parity::Even,
            ..Self::default()
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// An open serial device.
///
/// Implements `Read` and `Write` for the data lines. The modem control lines
/// are exposed through [`SerialLink::request_line`] (RTS out) and
/// [`SerialLink::flow_input`] (CTS in), each on its own cloned handle so they
/// can live on a different thread than the data lines.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: PathBuf,
}

impl SerialLink {
    /// Open a serial device with explicit line settings.
    pub fn open(path: impl AsRef<Path>, settings: &SerialSettings) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| LinkError::Open {
            path: path.clone(),
            source,
        };

        let data_bits = data_bits(settings.data_bits).map_err(open_err)?;
        let parity = match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        };

        let port = serialport::new(path.to_string_lossy(), settings.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(open_err)?;

        info!(
            ?path,
            baud_rate = settings.baud_rate,
            data_bits = settings.data_bits,
            parity = ?settings.parity,
            "opened serial link"
        );

        Ok(Self { port, path })
    }

    /// Handle that drives the RTS output of this device.
    pub fn request_line(&self) -> Result<RtsLine> {
        let port = self.port.try_clone().map_err(|e| LinkError::ControlLine {
            line: "RTS",
            source: e,
        })?;
        debug!(path = ?self.path, "cloned handle for RTS output");
        Ok(RtsLine { port })
    }

    /// Handle that samples the CTS input of this device.
    pub fn flow_input(&self) -> Result<CtsInput> {
        let port = self.port.try_clone().map_err(|e| LinkError::ControlLine {
            line: "CTS",
            source: e,
        })?;
        debug!(path = ?self.path, "cloned handle for CTS input");
        Ok(CtsInput { port })
    }

    /// The device path this link was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .finish()
    }
}

/// RTS output of a serial device.
pub struct RtsLine {
    port: Box<dyn SerialPort>,
}

impl ControlLine for RtsLine {
    fn set_asserted(&mut self, asserted: bool) -> Result<()> {
        self.port
            .write_request_to_send(asserted)
            .map_err(|e| LinkError::ControlLine {
                line: "RTS",
                source: e,
            })
    }
}

/// CTS input of a serial device.
pub struct CtsInput {
    port: Box<dyn SerialPort>,
}

impl FlowInput for CtsInput {
    fn is_asserted(&mut self) -> Result<bool> {
        self.port
            .read_clear_to_send()
            .map_err(|e| LinkError::ControlLine {
                line: "CTS",
                source: e,
            })
    }
}

fn data_bits(bits: u8) -> std::result::Result<serialport::DataBits, serialport::Error> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            format!("unsupported data bits: {other}"),
        )),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
