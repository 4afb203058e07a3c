//! Runtime options for a command run.

use std::path::PathBuf;
use std::time::Duration;

/// Options shared by discovery and the protocols.
///
/// Use the builder-style setters to override defaults:
///
/// ```
/// use std::time::Duration;
/// use medlink_core::Settings;
///
/// let settings = Settings::default()
///     .scan_timeout(Duration::from_secs(20))
///     .update_weight(true);
/// assert_eq!(settings.audio_length, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// How long to watch advertisements for the target. Default: 10 seconds.
    pub scan_timeout: Duration,
    /// Stethoscope recording length. Default: 10 seconds.
    pub audio_length: Duration,
    /// Report every intermediate weight reading. Default: false.
    pub update_weight: bool,
    /// Verbose diagnostics. Default: true.
    pub debug: bool,
    /// Directory receiving stethoscope recordings. Default: current directory.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            audio_length: Duration::from_secs(10),
            update_weight: false,
            debug: true,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn audio_length(mut self, length: Duration) -> Self {
        self.audio_length = length;
        self
    }

    #[must_use]
    pub fn update_weight(mut self, enabled: bool) -> Self {
        self.update_weight = enabled;
        self
    }

    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Stethoscope collection window: the recording length plus two seconds.
    pub fn stethoscope_window(&self) -> Duration {
        self.audio_length.saturating_add(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.scan_timeout, Duration::from_secs(10));
        assert_eq!(settings.audio_length, Duration::from_secs(10));
        assert!(!settings.update_weight);
        assert!(settings.debug);
        assert_eq!(settings.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_builder_chain() {
        let settings = Settings::default()
            .scan_timeout(Duration::from_secs(3))
            .audio_length(Duration::from_secs(30))
            .update_weight(true)
            .debug(false)
            .output_dir("/tmp/recordings");
        assert_eq!(settings.scan_timeout, Duration::from_secs(3));
        assert!(settings.update_weight);
        assert!(!settings.debug);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/recordings"));
        assert_eq!(settings.stethoscope_window(), Duration::from_secs(32));
    }

    #[test]
    fn test_stethoscope_window_saturates() {
        let settings = Settings::default().audio_length(Duration::MAX);
        assert_eq!(settings.stethoscope_window(), Duration::MAX);
    }
}
