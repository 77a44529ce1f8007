//! Base traits and types for the streaming agent transport.
//!
//! The remote agent is an opaque capability: a single logical bidirectional
//! streaming connection that carries outbound audio frames and yields inbound
//! events (audio chunks, partial/final transcript fragments, tool-call
//! requests, lifecycle signals). Events for one session arrive in send order
//! and must each be handled exactly once without blocking the consumer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::audio::WireAudioPacket;
use crate::core::transcript::SpeakerRole;

/// Errors from the agent transport.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection to the remote agent failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// WebSocket-level failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Outbound message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Session is closed or was never opened.
    #[error("not connected")]
    NotConnected,

    /// The remote sent something outside the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for transport operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Inbound events from the remote agent, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Session handshake completed.
    Opened,
    /// A chunk of synthesized agent speech.
    AudioChunk(WireAudioPacket),
    /// Cumulative text-so-far for an open utterance.
    PartialTranscript {
        /// Speaker the fragment belongs to.
        role: SpeakerRole,
        /// Full text so far for the utterance.
        text: String,
    },
    /// Settled text for an utterance.
    FinalTranscript {
        /// Speaker the text belongs to.
        role: SpeakerRole,
        /// Final utterance text.
        text: String,
    },
    /// The agent requests a client-side tool invocation.
    ToolCall {
        /// Id to echo back in the acknowledgement.
        call_id: String,
        /// Tool name.
        name: String,
        /// Structured arguments.
        arguments: Value,
    },
    /// The caller spoke over the agent; flush playback now.
    Interrupted,
    /// The current agent turn is complete.
    TurnComplete,
    /// The remote closed the session.
    Closed,
    /// Transport-level failure; the session is over.
    Error(String),
}

/// Declaration of one client-side tool offered to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema for the arguments.
    pub parameters: Value,
}

/// Connection-time configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    /// Model to converse with.
    pub model: String,
    /// System prompt / persona instructions.
    pub instructions: String,
    /// Synthesized voice identity for the opening persona.
    pub voice: String,
    /// Tools the agent may call.
    pub tools: Vec<ToolDeclaration>,
    /// Stream caller-side transcription.
    pub transcribe_input: bool,
    /// Stream agent-side transcription.
    pub transcribe_output: bool,
}

/// An open bidirectional session.
///
/// Sends are fire-and-forget with respect to the caller's event loop: they
/// enqueue onto the connection's writer and never wait on network I/O.
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Send one encoded capture frame.
    async fn send_audio(&self, packet: WireAudioPacket) -> AgentResult<()>;

    /// Send a typed caller message.
    async fn send_text(&self, text: &str) -> AgentResult<()>;

    /// Acknowledge a tool call, echoing its id.
    async fn send_tool_result(&self, call_id: &str, name: &str, result: Value) -> AgentResult<()>;

    /// Close the session. Safe to call more than once.
    async fn close(&mut self) -> AgentResult<()>;
}

/// Factory for sessions; the seam a scripted transport plugs into for tests.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Open a session, returning the send half and the inbound event stream.
    async fn open(
        &self,
        setup: &SessionSetup,
    ) -> AgentResult<(Box<dyn AgentSession>, mpsc::Receiver<AgentEvent>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("connection failed"));

        assert_eq!(AgentError::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn test_tool_declaration_serializes() {
        let tool = ToolDeclaration {
            name: "submit_lead".to_string(),
            description: "Capture lead data.".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("submit_lead"));
    }
}
