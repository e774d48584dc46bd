use crate::validate_enum;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub dvd: DvdSettings,

    #[serde(default)]
    pub fingerprint: FingerprintSettings,
}

/// General settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// DVD playback settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DvdSettings {
    /// Seek in place when a chapter of the already spinning disc is opened.
    /// Off by default: the pipeline reopens the device instead.
    #[serde(default)]
    pub fast_seek: bool,
}

/// Fingerprint bridge settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FingerprintSettings {
    /// Target sample rate handed to the extractor
    #[serde(default = "default_rate")]
    pub rate: i32,

    /// Seconds of audio the extractor needs
    #[serde(default = "default_seconds")]
    pub seconds: i32,

    /// Analysis window size
    #[serde(default = "default_winsize")]
    pub winsize: i32,

    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Multipart field carrying the raw fingerprint
    #[serde(default = "default_field_name")]
    pub field_name: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound for each READY/PAUSED transition while probing the rate
    #[serde(default = "default_state_timeout")]
    pub state_timeout_ms: u64,

    /// Extra attempts after a transport failure
    #[serde(default = "default_submit_retries")]
    pub submit_retries: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            seconds: default_seconds(),
            winsize: default_winsize(),
            server_url: default_server_url(),
            field_name: default_field_name(),
            poll_interval_ms: default_poll_interval(),
            state_timeout_ms: default_state_timeout(),
            submit_retries: default_submit_retries(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_rate() -> i32 {
    11025
}
fn default_seconds() -> i32 {
    135
}
fn default_winsize() -> i32 {
    1024
}
fn default_server_url() -> String {
    "http://ws.audioscrobbler.com/fingerprint/query/".to_string()
}
fn default_field_name() -> String {
    "fpdata".to_string()
}
fn default_poll_interval() -> u64 {
    100
}
fn default_state_timeout() -> u64 {
    1000
}
fn default_submit_retries() -> u32 {
    2
}
fn default_request_timeout() -> u64 {
    30
}

impl FingerprintSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("bpctl");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        let fp = &self.fingerprint;
        if fp.rate <= 0 {
            anyhow::bail!("Invalid fingerprint rate: {} (must be positive)", fp.rate);
        }
        if fp.seconds <= 0 {
            anyhow::bail!(
                "Invalid fingerprint duration: {}s (must be positive)",
                fp.seconds
            );
        }
        if fp.winsize <= 0 {
            anyhow::bail!("Invalid window size: {} (must be positive)", fp.winsize);
        }
        if fp.poll_interval_ms == 0 {
            anyhow::bail!("Invalid poll interval: 0ms");
        }
        if !(fp.server_url.starts_with("http://") || fp.server_url.starts_with("https://")) {
            anyhow::bail!("Invalid server URL: {} (expected http or https)", fp.server_url);
        }
        if fp.field_name.is_empty() {
            anyhow::bail!("Fingerprint field name must not be empty");
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert!(!config.dvd.fast_seek);
        assert_eq!(config.fingerprint.rate, 11025);
        assert_eq!(config.fingerprint.winsize, 1024);
        assert_eq!(config.fingerprint.field_name, "fpdata");
        assert_eq!(config.fingerprint.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.fingerprint.state_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_log_level() {
        let config = Config::default();
        assert!(config.validate_log_level("debug").is_ok());
        assert!(config.validate_log_level("error").is_ok());
        assert!(config.validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
[dvd]
fast_seek = true

[fingerprint]
rate = 44100
server_url = "https://example.org/fp"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.dvd.fast_seek);
        assert_eq!(config.fingerprint.rate, 44100);
        assert_eq!(config.fingerprint.server_url, "https://example.org/fp");
        // Unspecified values fall back to defaults
        assert_eq!(config.fingerprint.seconds, 135);
        assert_eq!(config.fingerprint.submit_retries, 2);
        assert_eq!(config.general.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fingerprint.winsize = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fingerprint.server_url = "ftp://example.org".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fingerprint.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.fingerprint.winsize, 1024);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_level = \"debug\"\n[fingerprint]\nseconds = 30").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.fingerprint.seconds, 30);
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fingerprint]\nrate = -5").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());
    }
}
