//! Splitter configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "input": { "device": "/dev/ttyUSB0", "version": "5.0" },
//!   "outputs": [
//!     { "device": "/dev/ttyUSB1" },
//!     { "device": "/dev/ttyUSB2", "flow_control": false, "interval_ms": 10000 }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use p1split_link::SerialSettings;
use p1split_telegram::{ChecksumPolicy, ProtocolVersion, ReaderConfig, DEFAULT_TELEGRAM_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitterError};
use crate::flow::DEFAULT_FLOW_POLL;
use crate::schedule::DEFAULT_INTERVAL;

/// Complete splitter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitterConfig {
    /// The meter link.
    pub input: InputConfig,
    /// Consumer links, numbered from 1 on the console.
    pub outputs: Vec<OutputConfig>,
    /// Flow input sampling period in milliseconds. Default: 5.
    #[serde(default = "default_flow_poll_ms")]
    pub flow_poll_ms: u64,
}

/// Inbound (meter) side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Serial device of the meter's P1 port.
    pub device: PathBuf,
    /// Meter protocol version. Default: 5.0.
    #[serde(default)]
    pub version: ProtocolVersion,
    /// Line settings; defaults follow `version`.
    #[serde(default)]
    pub serial: Option<SerialSettings>,
    /// Checksum policy; defaults follow `version`.
    #[serde(default)]
    pub checksum: Option<ChecksumPolicy>,
    /// Drive the request line (RTS) during reads. Default: true.
    #[serde(default = "default_true")]
    pub request_line: bool,
    /// Read deadline in milliseconds. Default: 5000.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// Largest accepted telegram in bytes. Default: 2048.
    #[serde(default = "default_telegram_size")]
    pub telegram_size: usize,
    #[serde(flatten)]
    pub port: PortSettings,
}

/// Outbound (consumer) side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Serial device of the consumer.
    pub device: PathBuf,
    /// Line settings; defaults to the input's.
    #[serde(default)]
    pub serial: Option<SerialSettings>,
    /// Gate transmission on the consumer's CTS line. When false the
    /// consumer is always considered to be requesting. Default: true.
    #[serde(default = "default_true")]
    pub flow_control: bool,
    #[serde(flatten)]
    pub port: PortSettings,
}

/// Operator-adjustable port fields, as initially configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cycle period in milliseconds. Default: 1000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl PortSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    u64::try_from(DEFAULT_INTERVAL.as_millis()).unwrap_or(1000)
}

fn default_flow_poll_ms() -> u64 {
    u64::try_from(DEFAULT_FLOW_POLL.as_millis()).unwrap_or(5)
}

fn default_telegram_size() -> usize {
    DEFAULT_TELEGRAM_SIZE
}

impl InputConfig {
    /// Input on `device` with defaults for everything else.
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            version: ProtocolVersion::default(),
            serial: None,
            checksum: None,
            request_line: true,
            read_timeout_ms: None,
            telegram_size: DEFAULT_TELEGRAM_SIZE,
            port: PortSettings::default(),
        }
    }

    /// Effective line settings.
    pub fn serial_settings(&self) -> SerialSettings {
        self.serial
            .clone()
            .unwrap_or_else(|| self.version.serial_settings())
    }

    /// Effective reader configuration.
    pub fn reader_config(&self) -> ReaderConfig {
        let mut config = ReaderConfig::for_version(self.version);
        if let Some(checksum) = self.checksum {
            config.checksum = checksum;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout = Duration::from_millis(ms);
        }
        config.telegram_size = self.telegram_size;
        config
    }
}

impl OutputConfig {
    /// Output on `device` with defaults for everything else.
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            serial: None,
            flow_control: true,
            port: PortSettings::default(),
        }
    }
}

impl SplitterConfig {
    /// Build a configuration from device paths alone.
    pub fn for_devices(input: impl Into<PathBuf>, outputs: &[PathBuf]) -> Self {
        Self {
            input: InputConfig::new(input),
            outputs: outputs.iter().cloned().map(OutputConfig::new).collect(),
            flow_poll_ms: default_flow_poll_ms(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SplitterError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reject configurations the splitter cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.outputs.is_empty() {
            return Err(SplitterError::Config("at least one output is required".into()));
        }
        if self.input.telegram_size == 0 {
            return Err(SplitterError::Config("telegram_size must be positive".into()));
        }
        if self.input.read_timeout_ms == Some(0) {
            return Err(SplitterError::Config("read_timeout_ms must be positive".into()));
        }
        if self.flow_poll_ms == 0 {
            return Err(SplitterError::Config("flow_poll_ms must be positive".into()));
        }
        if self.input.port.interval_ms == 0 {
            return Err(SplitterError::Config("input interval_ms must be positive".into()));
        }
        if let Some(index) = self.outputs.iter().position(|o| o.port.interval_ms == 0) {
            return Err(SplitterError::Config(format!(
                "output {} interval_ms must be positive",
                index + 1
            )));
        }
        Ok(())
    }

    /// Effective line settings of output `index` (0-based).
    pub fn output_serial(&self, index: usize) -> SerialSettings {
        self.outputs
            .get(index)
            .and_then(|output| output.serial.clone())
            .unwrap_or_else(|| self.input.serial_settings())
    }

    pub fn flow_poll(&self) -> Duration {
        Duration::from_millis(self.flow_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use p1split_link::Parity;

    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = SplitterConfig::from_json(
            r#"{ "input": { "device": "/dev/ttyP1" }, "outputs": [ { "device": "/dev/ttyA" } ] }"#,
        )
        .unwrap();

        assert_eq!(config.input.version, ProtocolVersion::Dsmr5);
        assert!(config.input.request_line);
        assert_eq!(config.input.port, PortSettings::default());
        assert_eq!(config.outputs[0].port.interval(), Duration::from_secs(1));
        assert!(config.outputs[0].flow_control);
        assert_eq!(config.flow_poll(), DEFAULT_FLOW_POLL);

        let reader = config.input.reader_config();
        assert_eq!(reader, ReaderConfig::default());
        assert_eq!(config.output_serial(0), SerialSettings::dsmr5());
    }

    #[test]
    fn version_drives_serial_and_checksum_defaults() {
        let config = SplitterConfig::from_json(
            r#"{
                "input": { "device": "/dev/ttyP1", "version": "2.0", "read_timeout_ms": 10000 },
                "outputs": [
                    { "device": "/dev/ttyA", "enabled": false, "interval_ms": 250 },
                    { "device": "/dev/ttyB", "serial": { "baud_rate": 115200 } }
                ]
            }"#,
        )
        .unwrap();

        let reader = config.input.reader_config();
        assert_eq!(reader.checksum, ChecksumPolicy::Optional);
        assert_eq!(reader.read_timeout, Duration::from_secs(10));

        let input = config.input.serial_settings();
        assert_eq!(input.baud_rate, 9600);
        assert_eq!(input.parity, Parity::Even);
        assert_eq!(config.output_serial(0), input);
        assert_eq!(config.output_serial(1).baud_rate, 115_200);

        assert!(!config.outputs[0].port.enabled);
        assert_eq!(config.outputs[0].port.interval_ms, 250);
    }

    #[test]
    fn explicit_checksum_overrides_version() {
        let mut input = InputConfig::new("/dev/ttyP1");
        input.version = ProtocolVersion::Dsmr2;
        input.checksum = Some(ChecksumPolicy::Required);
        assert_eq!(input.reader_config().checksum, ChecksumPolicy::Required);
    }

    #[test]
    fn rejects_unusable_configs() {
        let no_outputs = r#"{ "input": { "device": "/dev/ttyP1" }, "outputs": [] }"#;
        assert!(matches!(
            SplitterConfig::from_json(no_outputs),
            Err(SplitterError::Config(_))
        ));

        let zero_interval = r#"{ "input": { "device": "/dev/ttyP1" },
            "outputs": [ { "device": "/dev/ttyA", "interval_ms": 0 } ] }"#;
        assert!(matches!(
            SplitterConfig::from_json(zero_interval),
            Err(SplitterError::Config(msg)) if msg.contains("output 1")
        ));

        let unknown = r#"{ "input": { "device": "/dev/ttyP1" }, "outputs": [], "bogus": 1 }"#;
        assert!(matches!(
            SplitterConfig::from_json(unknown),
            Err(SplitterError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = SplitterConfig::from_file("/nonexistent/p1split.json").unwrap_err();
        assert!(matches!(err, SplitterError::ConfigFile { .. }));
        assert!(err.to_string().contains("/nonexistent/p1split.json"));
    }

    #[test]
    fn for_devices_builds_one_output_per_path() {
        let outputs = vec![PathBuf::from("/dev/ttyA"), PathBuf::from("/dev/ttyB")];
        let config = SplitterConfig::for_devices("/dev/ttyP1", &outputs);
        assert_eq!(config.outputs.len(), 2);
        assert!(config.validate().is_ok());
    }
}
