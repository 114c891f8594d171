use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use p1split_link::SerialSettings;
use serde::{Deserialize, Serialize};

/// Default telegram buffer size.
///
/// A typical DSMR 5 telegram is 1-2 KiB, depending on the values reported
/// by the meter and its M-Bus sub-devices.
pub const DEFAULT_TELEGRAM_SIZE: usize = 2048;

/// Default deadline for one telegram read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a telegram without checksum digits is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Telegrams without a checksum are valid.
    Optional,
    /// Telegrams must carry a checksum.
    #[default]
    Required,
}

/// DSMR protocol version of the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "2.0")]
    Dsmr2,
    #[serde(rename = "4.0")]
    Dsmr4,
    #[serde(rename = "4.2")]
    Dsmr42,
    #[default]
    #[serde(rename = "5.0")]
    Dsmr5,
}

impl ProtocolVersion {
    /// Serial line settings used by meters of this version.
    pub fn serial_settings(self) -> SerialSettings {
        match self {
            Self::Dsmr2 | Self::Dsmr4 | Self::Dsmr42 => SerialSettings::dsmr4(),
            Self::Dsmr5 => SerialSettings::dsmr5(),
        }
    }

    /// DSMR 2.x telegrams carry no CRC.
    pub fn default_checksum(self) -> ChecksumPolicy {
        match self {
            Self::Dsmr2 => ChecksumPolicy::Optional,
            _ => ChecksumPolicy::Required,
        }
    }
}

impl ChecksumPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
        }
    }
}

impl FromStr for ChecksumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            other => Err(format!("unknown checksum policy '{other}' (optional, required)")),
        }
    }
}

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dsmr2 => "2.0",
            Self::Dsmr4 => "4.0",
            Self::Dsmr42 => "4.2",
            Self::Dsmr5 => "5.0",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2" | "2.0" | "2.2" => Ok(Self::Dsmr2),
            "4" | "4.0" => Ok(Self::Dsmr4),
            "4.2" => Ok(Self::Dsmr42),
            "5" | "5.0" => Ok(Self::Dsmr5),
            other => Err(format!("unknown DSMR version '{other}' (2.0, 4.0, 4.2, 5.0)")),
        }
    }
}

/// Configuration for the telegram reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Checksum expectations. Default: required.
    pub checksum: ChecksumPolicy,
    /// Deadline for a single read. Default: 5 seconds.
    pub read_timeout: Duration,
    /// Size of the assembly buffer allocated up front. Default: 2 KiB.
    pub telegram_size: usize,
}

impl ReaderConfig {
    /// Reader defaults for a meter of the given version.
    pub fn for_version(version: ProtocolVersion) -> Self {
        Self {
            checksum: version.default_checksum(),
            ..Self::default()
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumPolicy::Required,
            read_timeout: DEFAULT_READ_TIMEOUT,
            telegram_size: DEFAULT_TELEGRAM_SIZE,
        }
    }
}
