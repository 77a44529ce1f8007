//! Top-level engine error type.
//!
//! Only device-acquisition and transport-connection failures ever reach the
//! caller of `start()`; every other fault is absorbed and logged at the
//! component boundary where it occurs.

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::agent::AgentError;
use crate::core::audio::{CaptureError, PlaybackError};

/// Engine-level errors surfaced to the UI.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The microphone could not be acquired or started.
    #[error("capture device error: {0}")]
    Capture(#[from] CaptureError),

    /// The output device could not be opened.
    #[error("playback device error: {0}")]
    Playback(#[from] PlaybackError),

    /// The agent transport failed.
    #[error("agent transport error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
