//! Engine configuration.
//!
//! Process-level knobs the scan engine reads at startup: the timezone that
//! anchors year boundaries, the read-chunk size, and the anchor policy for
//! the previous-timestamp default. Loaded from JSON; every field has a
//! default so an empty object is a valid config.

use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Records fetched per read syscall. With common record lengths this puts
/// each read well above 4 KiB, the typical filesystem I/O granule.
pub const DEFAULT_RECORDS_PER_READ: usize = 2000;

/// Anchor for the previous-timestamp default when no populated slot precedes
/// the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrevAnchor {
    /// One minute before the oldest prior file's year start, regardless of
    /// the bucket's timeframe.
    #[default]
    MinuteBefore,
    /// One timeframe before the oldest prior file's year start.
    TimeframeBefore,
}

/// Scan-engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timezone anchoring year-file boundaries, as an IANA name.
    pub timezone: Tz,
    /// Records fetched per read syscall.
    pub records_per_read: usize,
    /// Previous-timestamp default anchor.
    pub prev_anchor: PrevAnchor,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timezone: Tz::UTC,
            records_per_read: DEFAULT_RECORDS_PER_READ,
            prev_anchor: PrevAnchor::default(),
        }
    }
}

/// Errors from loading an [`EngineConfig`].
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The config file could not be read.
    #[snafu(display("Cannot read config file {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The config body is not valid JSON or holds invalid values.
    #[snafu(display("Malformed config: {source}"))]
    Parse { source: serde_json::Error },
}

impl EngineConfig {
    /// Parse a config from a JSON string.
    pub fn from_json(body: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(body).context(ParseSnafu)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read_to_string(path).context(IoSnafu {
            path: path.display().to_string(),
        })?;
        EngineConfig::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_utc_with_minute_anchor() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.timezone, Tz::UTC);
        assert_eq!(cfg.records_per_read, 2000);
        assert_eq!(cfg.prev_anchor, PrevAnchor::MinuteBefore);
    }

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = EngineConfig::from_json("{}").expect("valid config");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn json_round_trip_preserves_timezone_name() {
        let cfg = EngineConfig {
            timezone: "America/New_York".parse().expect("known zone"),
            records_per_read: 512,
            prev_anchor: PrevAnchor::TimeframeBefore,
        };
        let body = serde_json::to_string(&cfg).expect("serializes");
        assert!(body.contains("America/New_York"));
        let back = EngineConfig::from_json(&body).expect("parses back");
        assert_eq!(back, cfg);
    }

    #[test]
    fn unknown_timezone_is_a_parse_error() {
        let err = EngineConfig::from_json(r#"{"timezone": "Mars/Olympus"}"#)
            .expect_err("bogus zone");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reads_a_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"records_per_read": 64}}"#).expect("write config");
        let cfg = EngineConfig::load(file.path()).expect("loads");
        assert_eq!(cfg.records_per_read, 64);
        assert_eq!(cfg.timezone, Tz::UTC);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/no/such/config.json")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
