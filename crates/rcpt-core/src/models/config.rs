//! Configuration structures for the extraction service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rcpt_inference::GeminiConfig;

use super::upload::MAX_UPLOAD_BYTES;
use crate::error::RcptError;
use crate::extract::JsonLocator;

/// Environment variable that switches the service to production mode.
pub const ENV_MODE: &str = "RCPT_ENV";

/// Environment variable overriding the server bind address.
pub const ENV_BIND: &str = "RCPT_BIND";

/// Main configuration for rcpt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Inference provider configuration.
    pub provider: ProviderConfig,

    /// HTTP service configuration.
    pub server: ServerConfig,

    /// JSON recovery configuration.
    pub extraction: ExtractionConfig,
}

/// Inference provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Model name.
    pub model: String,

    /// API host.
    pub base_url: String,

    /// Name of the environment variable holding the API key.
    ///
    /// The key itself is never stored in the config file.
    pub api_key_env: String,

    /// Request timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: rcpt_inference::DEFAULT_MODEL.to_string(),
            base_url: rcpt_inference::DEFAULT_BASE_URL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,

    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,

    /// Hide internal error details from clients.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            production: false,
        }
    }
}

/// JSON recovery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// How to find the JSON object in the model's answer.
    pub json_locator: JsonLocator,
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Overlay settings taken from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay settings using an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_MODE) {
            self.server.production = mode.trim().eq_ignore_ascii_case("production");
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind.trim().to_string();
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_from(|key| std::env::var(key).ok())
    }

    /// Read the API key using an arbitrary variable lookup.
    pub fn api_key_from<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(&self.provider.api_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// Provider settings for a given key.
    pub fn gemini_config(&self, api_key: String) -> GeminiConfig {
        let timeout = match self.provider.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        GeminiConfig::new(api_key)
            .with_model(&self.provider.model)
            .with_base_url(&self.provider.base_url)
            .with_timeout(timeout)
    }

    /// Provider settings using the key from the environment.
    pub fn gemini_config_from_env(&self) -> Result<GeminiConfig, RcptError> {
        let key = self.api_key().ok_or_else(|| {
            RcptError::Config(format!(
                "{} environment variable is not set",
                self.provider.api_key_env
            ))
        })?;
        Ok(self.gemini_config(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RcptConfig::default();
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.provider.api_key_env, "GEMINI_API_KEY");
        assert!(!config.server.production);
        assert_eq!(config.extraction.json_locator, JsonLocator::Balanced);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RcptConfig =
            serde_json::from_str(r#"{"server": {"production": true}}"#).unwrap();
        assert!(config.server.production);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.provider.timeout_secs, 60);
    }

    #[test]
    fn test_apply_env() {
        let mut config = RcptConfig::default();
        config.apply_env_from(env(&[("RCPT_ENV", "Production"), ("RCPT_BIND", "127.0.0.1:8080")]));
        assert!(config.server.production);
        assert_eq!(config.server.bind, "127.0.0.1:8080");

        config.apply_env_from(env(&[("RCPT_ENV", "development")]));
        assert!(!config.server.production);
    }

    #[test]
    fn test_api_key_lookup() {
        let config = RcptConfig::default();
        assert_eq!(config.api_key_from(env(&[])), None);
        assert_eq!(config.api_key_from(env(&[("GEMINI_API_KEY", "  ")])), None);
        assert_eq!(
            config.api_key_from(env(&[("GEMINI_API_KEY", "abc\n")])),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_gemini_config_timeout() {
        let mut config = RcptConfig::default();
        assert_eq!(
            config.gemini_config("k".into()).timeout,
            Some(Duration::from_secs(60))
        );
        config.provider.timeout_secs = 0;
        assert_eq!(config.gemini_config("k".into()).timeout, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = RcptConfig::default();
        config.provider.model = "gemini-2.0-flash".to_string();
        config.save(&path).unwrap();

        let loaded = RcptConfig::from_file(&path).unwrap();
        assert_eq!(loaded.provider.model, "gemini-2.0-flash");
    }
}
