//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod serve;

use std::path::{Path, PathBuf};

use tracing::debug;

use rcpt_core::RcptConfig;

/// Default config file location: `<config_dir>/rcpt/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
        .join("config.json")
}

/// Resolve the config file: the explicit path, else the default one.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration and overlay the environment.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<RcptConfig> {
    let mut config = match explicit {
        Some(path) => RcptConfig::from_file(Path::new(path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Loading config from {}", path.display());
                RcptConfig::from_file(&path)?
            } else {
                RcptConfig::default()
            }
        }
    };

    config.apply_env();
    Ok(config)
}
