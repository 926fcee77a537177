use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use stream_saver_twitch::{Credentials, TwitchEndpoints, DEFAULT_API_URL, DEFAULT_TOKEN_URL};

/// Name of the per-user directory holding the config file and crash reports
pub const APP_DIR_NAME: &str = "stream-saver";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "stream-saver.yaml";

/// Environment variable prefix, e.g. `STREAM_SAVER__RECORDER__USERNAME`
pub const ENV_PREFIX: &str = "STREAM_SAVER";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub twitch: TwitchConfig,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_url: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl TwitchConfig {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.client_id, &self.client_secret)
    }

    #[must_use]
    pub fn endpoints(&self) -> TwitchEndpoints {
        TwitchEndpoints {
            token_url: self.token_url.clone(),
            api_url: self.api_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Login name of the broadcaster to watch
    pub username: String,
    /// streamlink quality selector ("best", "720p60", ...)
    pub quality: String,
    /// Root of the recorded/ and processed/ trees
    pub download_dir: PathBuf,
    /// Seconds between status checks while offline
    pub check_interval: u64,
    /// Move finished recordings instead of repairing them with ffmpeg
    pub disable_ffmpeg: bool,
    pub ffmpeg_path: PathBuf,
    pub streamlink_path: PathBuf,
    pub file_extension: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            quality: "best".to_string(),
            download_dir: default_download_dir(),
            check_interval: 15,
            disable_ffmpeg: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            streamlink_path: PathBuf::from("streamlink"),
            file_extension: "mp4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "compact", "pretty" or "json"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        // STREAM_SAVER__RECORDER__CHECK_INTERVAL=30, etc.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Whether the credentials are present at all (file or environment).
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.twitch.client_id.is_empty() && !self.twitch.client_secret.is_empty()
    }

    /// Validate configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.twitch.client_id.trim().is_empty() {
            errors.push("twitch.client_id must not be empty".to_string());
        }
        if self.twitch.client_secret.trim().is_empty() {
            errors.push("twitch.client_secret must not be empty".to_string());
        }
        if self.twitch.token_url.trim().is_empty() {
            errors.push("twitch.token_url must not be empty".to_string());
        }
        if self.twitch.api_url.trim().is_empty() {
            errors.push("twitch.api_url must not be empty".to_string());
        }

        if self.recorder.username.is_empty() {
            errors.push("recorder.username must not be empty".to_string());
        } else if !is_valid_login(&self.recorder.username) {
            errors.push(format!(
                "recorder.username '{}' is not a valid Twitch login (letters, digits and '_', at most 25)",
                self.recorder.username
            ));
        }
        if self.recorder.quality.trim().is_empty() {
            errors.push("recorder.quality must not be empty".to_string());
        }
        if self.recorder.download_dir.as_os_str().is_empty() {
            errors.push("recorder.download_dir must not be empty".to_string());
        }
        if self.recorder.file_extension.is_empty()
            || !self.recorder.file_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            errors.push(format!(
                "recorder.file_extension '{}' must be non-empty and alphanumeric",
                self.recorder.file_extension
            ));
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            errors.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "compact" | "pretty" | "json") {
            errors.push(format!(
                "logging.format '{}' must be one of compact, pretty, json",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Twitch logins are 1 to 25 ASCII letters, digits or underscores.
fn is_valid_login(login: &str) -> bool {
    !login.is_empty()
        && login.len() <= 25
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Per-user application directory: `~/.config/stream-saver` on Linux,
/// `~/Library/Application Support/stream-saver` on macOS, `%APPDATA%\stream-saver`
/// on Windows. Falls back to the system temp directory.
#[must_use]
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Default location written by the setup wizard
#[must_use]
pub fn default_config_path() -> PathBuf {
    app_config_dir().join("config.yaml")
}

/// Directory receiving crash reports
#[must_use]
pub fn debug_dir() -> PathBuf {
    app_config_dir().join("debug")
}

/// The platform download directory (`~/Downloads`) plus `twitch-downloads`
#[must_use]
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(std::env::temp_dir)
        .join("twitch-downloads")
}
