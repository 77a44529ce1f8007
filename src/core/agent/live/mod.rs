//! Live agent service transport.
//!
//! WebSocket implementation of the agent capability: JSON wire messages, a
//! writer task for outbound frames, and a reader task that surfaces inbound
//! frames as [`crate::core::agent::AgentEvent`]s.

mod client;
mod config;
mod messages;

pub use client::{LiveAgentConnector, LiveAgentSession};
pub use config::{
    DEFAULT_LIVE_ENDPOINT, DEFAULT_LIVE_MODEL, LIVE_CAPTURE_SAMPLE_RATE,
    LIVE_PLAYBACK_SAMPLE_RATE, LiveAgentConfig,
};
