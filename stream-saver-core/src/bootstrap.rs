//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{default_config_path, Config, LOCAL_CONFIG_FILE};
use crate::error::{Error, Result};

/// Explicit config file location
pub const CONFIG_PATH_ENV: &str = "STREAM_SAVER_CONFIG_PATH";

/// Find the config file to load.
///
/// Search order:
/// 1. `explicit` (the `--config` flag or [`CONFIG_PATH_ENV`])
/// 2. `./stream-saver.yaml`
/// 3. `<config_home>/stream-saver/config.yaml`
///
/// An explicit path is returned even when missing so loading can report it.
#[must_use]
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    let default = default_config_path();
    default.is_file().then_some(default)
}

/// Load the configuration from `config_file` (if any) and the environment.
///
/// Validation is left to [`ensure_valid`] so command line overrides can be
/// applied first.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    match config_file {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::Config(format!("config file {} not found", path.display())));
            }
            info!(path = %path.display(), "Loading config file");
            Ok(Config::from_file(path)?)
        }
        None => {
            info!("No config file found, using environment variables");
            Ok(Config::from_env()?)
        }
    }
}

/// Reject the configuration when any value is unusable, listing every problem.
pub fn ensure_valid(config: &Config) -> Result<()> {
    config.validate().map_err(|errors| {
        Error::Config(format!(
            "{} problem(s): {}",
            errors.len(),
            errors.join("; ")
        ))
    })
}
