//! Settings file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use medlink_core::{Error, Settings};

/// Settings file structure.
///
/// Keys are PascalCase (`ScanTimeout`, `AudioLength`, ...). Every key is
/// optional; absent keys take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Advertisement scan timeout in seconds
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: u64,

    /// Stethoscope recording length in seconds
    #[serde(default = "default_audio_length")]
    pub audio_length: u64,

    /// Emit intermediate weight readings
    #[serde(default)]
    pub update_weight: bool,

    /// Verbose diagnostic logging
    #[serde(default = "default_true")]
    pub debug: bool,

    /// Directory for stethoscope recordings (current directory if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_scan_timeout() -> u64 {
    10
}

fn default_audio_length() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_timeout: default_scan_timeout(),
            audio_length: default_audio_length(),
            update_weight: false,
            debug: true,
            output_dir: None,
        }
    }
}

impl Config {
    /// Upper bound for `ScanTimeout` and `AudioLength`: one day.
    pub const MAX_SECONDS: u64 = 86_400;

    /// File name looked up in the working directory.
    pub const LOCAL_FILE: &'static str = "settings.json";

    /// Per-user settings path, `<config_dir>/medlink/settings.toml`.
    pub fn user_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medlink")
            .join("settings.toml")
    }

    /// First existing settings file: `./settings.json`, then [`Self::user_path`].
    pub fn locate() -> Option<PathBuf> {
        [PathBuf::from(Self::LOCAL_FILE), Self::user_path()]
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Load the settings file found by [`Self::locate`], or defaults.
    pub fn load_default() -> Self {
        match Self::locate() {
            Some(path) => Self::load(&path),
            None => Self::default(),
        }
    }

    /// Load config from `path`, or return defaults if it is missing,
    /// unreadable or malformed.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(path, &content) {
                Ok(config) => return config,
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to parse settings {}: {}",
                        path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read settings {}: {}", path.display(), e);
            }
        }
        Self::default()
    }

    /// Parse `content` as TOML when `path` ends in `.toml`, JSON otherwise.
    fn parse(path: &Path, content: &str) -> Result<Self, String> {
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            toml::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(content).map_err(|e| e.to_string())
        }
    }

    /// Convert into runtime settings.
    ///
    /// `ScanTimeout` and `AudioLength` must lie in `1..=MAX_SECONDS`.
    pub fn into_settings(self) -> medlink_core::Result<Settings> {
        check_seconds("ScanTimeout", self.scan_timeout)?;
        check_seconds("AudioLength", self.audio_length)?;
        let mut settings = Settings::default()
            .scan_timeout(Duration::from_secs(self.scan_timeout))
            .audio_length(Duration::from_secs(self.audio_length))
            .update_weight(self.update_weight)
            .debug(self.debug);
        if let Some(dir) = self.output_dir {
            settings = settings.output_dir(dir);
        }
        Ok(settings)
    }
}

fn check_seconds(key: &str, value: u64) -> medlink_core::Result<()> {
    if (1..=Config::MAX_SECONDS).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "{key} must be between 1 and {} seconds, got {value}",
            Config::MAX_SECONDS
        )))
    }
}
