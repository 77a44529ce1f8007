//! Engine configuration.
//!
//! Configuration comes from a YAML file, environment variables, or defaults;
//! priority: YAML > environment > defaults. The API key is never defaulted
//! and is read from the environment when the file omits it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::agent::live::{DEFAULT_LIVE_ENDPOINT, DEFAULT_LIVE_MODEL};
use crate::core::persona::PersonaProfile;

/// Environment variable holding the live agent API key.
pub const ENV_API_KEY: &str = "LEADLINE_API_KEY";

/// Environment variable overriding the live agent endpoint.
pub const ENV_ENDPOINT: &str = "LEADLINE_ENDPOINT";

/// Environment variable overriding the conversation model.
pub const ENV_MODEL: &str = "LEADLINE_MODEL";

/// Environment variable holding the lead webhook URL.
pub const ENV_WEBHOOK_URL: &str = "LEADLINE_WEBHOOK_URL";

/// Default dual-persona intake instructions.
const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a dual-persona voice receptionist for a heating and cooling service \
desk. You switch between two personas based on the caller's needs.

PRIMARY PERSONA: the front-desk receptionist. Friendly and patient. Handles \
repair bookings and rebate questions.

SECONDARY PERSONA: the emergency dispatcher. Calm, fast, and authoritative. \
Triggered when the caller mentions a gas smell, no heat, a water leak, or \
banging noises. On a gas smell, instruct the caller to hang up, leave the \
house, and call 911 before anything else.

TOOLS:
1. Call set_emergency_status immediately when switching to or from the \
emergency dispatcher.
2. Call submit_lead once the caller's name, phone, and issue are identified.
3. For no-heat calls where the unit is 10 or more years old, tag the lead \
temp as HOT INSTALL; otherwise REPAIR.

Close by confirming a callback within 60 minutes.";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key in the file or the environment.
    #[error("missing API key: set {ENV_API_KEY}")]
    MissingApiKey,

    /// The lead webhook URL does not parse.
    #[error("invalid lead webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Live agent connection settings.
    pub agent: AgentSettings,
    /// Audio pipeline settings.
    pub audio: AudioSettings,
    /// Persona labels and voices.
    pub personas: PersonaSettings,
    /// Intake behavior: instructions and the lead webhook.
    pub intake: IntakeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent: AgentSettings::default(),
            audio: AudioSettings::default(),
            personas: PersonaSettings::default(),
            intake: IntakeSettings::default(),
        }
    }
}

/// Live agent connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// WebSocket endpoint of the live agent service.
    pub endpoint: String,
    /// API key. Prefer the environment over the file for this one.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Conversation model.
    pub model: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_LIVE_MODEL.to_string(),
        }
    }
}

/// Audio pipeline settings.
///
/// The sample rates are configuration constants of the deployment, not
/// protocol requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Microphone sample rate in Hz.
    pub capture_sample_rate: u32,
    /// Samples per outbound frame.
    pub capture_frame_samples: usize,
    /// Agent speech sample rate in Hz.
    pub playback_sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16_000,
            capture_frame_samples: 4096,
            playback_sample_rate: 24_000,
        }
    }
}

/// Persona labels and synthesized voice identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    /// Front-desk receptionist persona.
    pub receptionist: PersonaProfile,
    /// Emergency dispatcher persona.
    pub dispatcher: PersonaProfile,
}

impl Default for PersonaSettings {
    fn default() -> Self {
        Self {
            receptionist: PersonaProfile {
                label: "Chloe".to_string(),
                voice: "Kore".to_string(),
            },
            dispatcher: PersonaProfile {
                label: "Sam".to_string(),
                voice: "Zephyr".to_string(),
            },
        }
    }
}

/// Intake behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    /// System prompt handed to the agent at session setup.
    pub system_instruction: String,
    /// Lead webhook URL; leads only reach UI state when unset.
    pub webhook_url: Option<String>,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            webhook_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.agent.api_key = std::env::var(ENV_API_KEY).map_err(|_| ConfigError::MissingApiKey)?;
        if let Ok(endpoint) = std::env::var(ENV_ENDPOINT) {
            config.agent.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            config.agent.model = model;
        }
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            config.intake.webhook_url = Some(url);
        }

        Ok(config)
    }

    /// Load configuration from a YAML file, with the environment filling in
    /// the API key when the file omits it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = serde_yaml::from_str(&text)?;

        if config.agent.api_key.is_empty() {
            config.agent.api_key =
                std::env::var(ENV_API_KEY).map_err(|_| ConfigError::MissingApiKey)?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.audio.capture_sample_rate, 16_000);
        assert_eq!(config.audio.capture_frame_samples, 4096);
        assert_eq!(config.audio.playback_sample_rate, 24_000);
        assert_eq!(config.personas.receptionist.voice, "Kore");
        assert_eq!(config.personas.dispatcher.voice, "Zephyr");
        assert!(config.intake.webhook_url.is_none());
        assert!(config
            .intake
            .system_instruction
            .contains("set_emergency_status"));
    }

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        // SAFETY: serialized with the other env tests.
        unsafe { std::env::remove_var(ENV_API_KEY) };
        assert!(matches!(
            EngineConfig::from_env(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        unsafe {
            std::env::set_var(ENV_API_KEY, "test-key");
            std::env::set_var(ENV_WEBHOOK_URL, "https://hooks.example.com/leads");
        }

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.agent.api_key, "test-key");
        assert_eq!(
            config.intake.webhook_url.as_deref(),
            Some("https://hooks.example.com/leads")
        );

        unsafe {
            std::env::remove_var(ENV_API_KEY);
            std::env::remove_var(ENV_WEBHOOK_URL);
        }
    }

    #[test]
    #[serial]
    fn test_from_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "agent:\n  api_key: file-key\npersonas:\n  dispatcher:\n    label: Morgan\n    voice: Zephyr\n"
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.agent.api_key, "file-key");
        assert_eq!(config.personas.dispatcher.label, "Morgan");
        // Untouched sections keep their defaults.
        assert_eq!(config.audio.capture_frame_samples, 4096);
        assert_eq!(config.personas.receptionist.label, "Chloe");
    }
}
