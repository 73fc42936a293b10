//! Plain-data configuration types a CLI/TOML front end (out of scope) would
//! deserialize into and hand to the reader/importer.

use serde::{Deserialize, Serialize};

/// Default size of the fingerprint window read by
/// [`crate::reader::LogFileReader::check_file_signature_and_offset`].
pub const DEFAULT_SIGNATURE_WINDOW_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub signature_window_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            signature_window_bytes: DEFAULT_SIGNATURE_WINDOW_BYTES,
        }
    }
}

/// Regex-bounded multiline record assembly. Absent `start_pattern` means
/// line-per-event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilineConfig {
    pub start_pattern: Option<String>,
    pub continue_pattern: Option<String>,
}

impl MultilineConfig {
    pub fn is_enabled(&self) -> bool {
        self.start_pattern.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub recursive: bool,
}

/// Process-wide knobs referenced by [`crate::pipeline::PipelineContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub enable_log_time_auto_adjust: bool,
    /// Seconds to add to a wall-clock read when auto-adjust is enabled,
    /// mirroring `AppConfig::GetTimeDelta()` in the original source.
    pub time_delta_secs: i64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enable_log_time_auto_adjust: false,
            time_delta_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_config_default_matches_documented_window() {
        assert_eq!(ReaderConfig::default().signature_window_bytes, 1024);
    }

    #[test]
    fn multiline_disabled_without_start_pattern() {
        assert!(!MultilineConfig::default().is_enabled());
        let cfg = MultilineConfig {
            start_pattern: Some("^\\d".to_string()),
            continue_pattern: None,
        };
        assert!(cfg.is_enabled());
    }
}
