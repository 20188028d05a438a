//! Endpoint and model configuration, optionally loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NetpeekError, Result};

pub const DEFAULT_GEO_URL: &str = "https://ipwho.is/";
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";
pub const DEFAULT_CHAT_URL: &str = "https://api.cohere.com/v2/chat";
pub const DEFAULT_MODEL: &str = "command-a-03-2025";
pub const DEFAULT_API_KEY_ENV: &str = "NETPEEK_API_KEY";

/// Value of the environment variable `name`; blank counts as missing.
pub fn read_secret(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(NetpeekError::ConfigurationMissing(name.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub geo_url: String,
    pub probe_url: String,
    pub chat_url: String,
    pub model: String,
    pub temperature: f32,
    /// Probes per latency test.
    pub probe_count: usize,
    pub probe_delay_ms: u64,
    /// Applies to geo and probe requests only; chat streams are never cut off.
    pub request_timeout_secs: Option<u64>,
    /// Name of the environment variable holding the chat bearer token.
    pub api_key_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geo_url: DEFAULT_GEO_URL.to_string(),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            chat_url: DEFAULT_CHAT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            probe_count: crate::latency::DEFAULT_PROBE_COUNT,
            probe_delay_ms: crate::latency::DEFAULT_INTER_DELAY.as_millis() as u64,
            request_timeout_secs: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| NetpeekError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NetpeekError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: "netpeek::config", path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(NetpeekError::InvalidConfig(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.probe_count == 0 {
            return Err(NetpeekError::InvalidConfig(
                "probe_count must be at least 1".to_string(),
            ));
        }
        for (name, url) in [
            ("geo_url", &self.geo_url),
            ("probe_url", &self.probe_url),
            ("chat_url", &self.chat_url),
        ] {
            if url.trim().is_empty() {
                return Err(NetpeekError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.model.trim().is_empty() {
            return Err(NetpeekError::InvalidConfig("model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    /// Read the chat bearer token from the environment.
    pub fn api_key(&self) -> Result<String> {
        read_secret(&self.api_key_env)
    }

    /// Client for the geo and probe flows.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder
            .build()
            .map_err(|e| NetpeekError::InvalidConfig(format!("cannot build HTTP client: {e}")))
    }
}
