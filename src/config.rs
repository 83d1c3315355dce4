//! Session configuration.
//!
//! Covers the connection endpoint, the credential environment variable, and
//! the fixed audio encoding shared by every component of a session: PCM
//! 16-bit signed little-endian, mono, 24kHz by default.

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Default realtime WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://api.openai.com/v1/realtime";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "REALTIME_API_KEY";

/// Default audio sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default samples per audio frame pushed through the bridge.
pub const DEFAULT_FRAME_SAMPLES: usize = 2_000;

/// Configuration for a realtime session.
///
/// All fields have working defaults; `SessionConfig::default()` targets the
/// default endpoint and reads the API key from `REALTIME_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// WebSocket endpoint URL
    pub endpoint: String,

    /// Name of the environment variable holding the bearer credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier, appended as a `model` query parameter when set
    #[serde(default)]
    pub model: Option<String>,

    /// Audio sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio channel count
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Samples per audio frame
    #[serde(default = "default_frame_samples")]
    pub frame_samples: usize,

    /// Mirror every event-log append to `tracing::debug!`
    #[serde(default)]
    pub debug: bool,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u16 {
    1
}

fn default_frame_samples() -> usize {
    DEFAULT_FRAME_SAMPLES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: default_api_key_env(),
            model: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            debug: false,
        }
    }
}

impl SessionConfig {
    /// Build a configuration from the process environment.
    ///
    /// Loads a `.env` file when present, then applies `REALTIME_ENDPOINT`
    /// and `REALTIME_MODEL` overrides on top of the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("REALTIME_ENDPOINT") {
            if !endpoint.is_empty() {
                config.endpoint = endpoint;
            }
        }
        if let Ok(model) = std::env::var("REALTIME_MODEL") {
            if !model.is_empty() {
                config.model = Some(model);
            }
        }
        config
    }

    /// Full WebSocket URL including the model query parameter.
    pub fn ws_url(&self) -> String {
        match &self.model {
            Some(model) => format!("{}?model={}", self.endpoint, model),
            None => self.endpoint.clone(),
        }
    }

    /// Read the bearer credential from the configured environment variable.
    pub fn api_key(&self) -> SessionResult<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SessionError::MissingCredentials(self.api_key_env.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.frame_samples, 2_000);
        assert!(!config.debug);
    }

    #[test]
    fn test_ws_url_with_model() {
        let config = SessionConfig {
            model: Some("default-realtime".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.ws_url(),
            format!("{}?model=default-realtime", DEFAULT_ENDPOINT)
        );
    }

    #[test]
    fn test_ws_url_without_model() {
        let config = SessionConfig::default();
        assert_eq!(config.ws_url(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_api_key_missing() {
        let config = SessionConfig {
            api_key_env: "VOICEWIRE_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        // SAFETY: test-local variable name, not read by any other test
        unsafe { std::env::remove_var("VOICEWIRE_TEST_UNSET_KEY") };
        match config.api_key() {
            Err(SessionError::MissingCredentials(var)) => {
                assert_eq!(var, "VOICEWIRE_TEST_UNSET_KEY");
            }
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
    }

    #[test]
    fn test_api_key_present() {
        let config = SessionConfig {
            api_key_env: "VOICEWIRE_TEST_SET_KEY".to_string(),
            ..Default::default()
        };
        unsafe { std::env::set_var("VOICEWIRE_TEST_SET_KEY", "sk-test") };
        assert_eq!(config.api_key().unwrap(), "sk-test");
    }
}
