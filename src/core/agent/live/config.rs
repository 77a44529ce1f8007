//! Connection constants and configuration for the live agent service.

use serde::{Deserialize, Serialize};

/// Default WebSocket endpoint for the live agent service.
pub const DEFAULT_LIVE_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default conversation model.
pub const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// Sample rate of agent speech on the playback direction, in Hz.
pub const LIVE_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Sample rate expected on the capture direction, in Hz.
pub const LIVE_CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Connection configuration for the live agent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveAgentConfig {
    /// WebSocket endpoint.
    pub endpoint: String,
    /// API key, passed as a query parameter.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

impl LiveAgentConfig {
    /// Configuration for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_LIVE_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LiveAgentConfig::new("key-123");
        assert_eq!(config.endpoint, DEFAULT_LIVE_ENDPOINT);
        assert_eq!(config.model, DEFAULT_LIVE_MODEL);
        assert_eq!(config.api_key, "key-123");
    }

    #[test]
    fn test_sample_rate_constants() {
        assert_eq!(LIVE_CAPTURE_SAMPLE_RATE, 16_000);
        assert_eq!(LIVE_PLAYBACK_SAMPLE_RATE, 24_000);
    }
}
