//! Wire message types for the live agent WebSocket protocol.
//!
//! All messages are JSON-encoded over a single WebSocket. Client messages are
//! single-key objects tagged by variant; server messages are a struct of
//! optional payloads (the remote sets exactly one per frame).
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - `setup` - Declare model, instructions, voice, tools, transcription
//! - `realtimeInput` - Append encoded capture audio
//! - `clientContent` - Typed caller turn
//! - `toolResponse` - Acknowledge tool calls
//!
//! Server messages (received from server):
//! - `setupComplete` - Session handshake finished
//! - `serverContent` - Audio chunks, transcription deltas, turn lifecycle
//! - `toolCall` - Tool invocation requests

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Client messages sent to the live agent service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session setup; must be the first message on the socket.
    Setup(Setup),
    /// Streaming media input.
    RealtimeInput(RealtimeInput),
    /// A typed caller turn.
    ClientContent(ClientContent),
    /// Results for previously requested tool calls.
    ToolResponse(ToolResponse),
}

/// Session setup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Model identifier.
    pub model: String,
    /// Generation and speech configuration.
    pub generation_config: GenerationConfig,
    /// System prompt.
    pub system_instruction: Content,
    /// Tool declarations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolList>,
    /// Request caller-side transcription streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    /// Request agent-side transcription streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<TranscriptionConfig>,
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modalities; this engine always requests audio.
    pub response_modalities: Vec<String>,
    /// Voice selection.
    pub speech_config: SpeechConfig,
}

/// Speech configuration wrapper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    /// Voice configuration.
    pub voice_config: VoiceConfig,
}

/// Voice configuration wrapper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Prebuilt voice selection.
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

/// Named prebuilt voice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    /// Voice identity name.
    pub voice_name: String,
}

/// Empty marker enabling a transcription direction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptionConfig {}

/// A list of function declarations offered to the agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolList {
    /// Declared functions.
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One declared function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    /// Function name.
    pub name: String,
    /// Function description.
    pub description: String,
    /// JSON schema for parameters.
    pub parameters: Value,
}

/// Text content made of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// Content parts.
    pub parts: Vec<Part>,
    /// Speaker role, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    /// Plain text content with no role.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
            role: None,
        }
    }
}

/// One content part: text or inline binary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline media payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Base64 media with its encoding tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Encoding tag, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

/// Streaming media input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// Encoded audio chunks, in capture order.
    pub media_chunks: Vec<InlineData>,
}

/// A typed caller turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    /// Turns to append to the conversation.
    pub turns: Vec<Content>,
    /// Whether the caller's turn is complete.
    pub turn_complete: bool,
}

/// Tool results batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// One response per acknowledged call.
    pub function_responses: Vec<FunctionResponse>,
}

/// Result of one tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    /// Id of the originating call.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Structured result.
    pub response: Value,
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// One frame from the live agent service. Exactly one payload is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    /// Session handshake finished.
    #[serde(default)]
    pub setup_complete: Option<SetupComplete>,
    /// Streaming content from the agent.
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    /// Tool invocation requests.
    #[serde(default)]
    pub tool_call: Option<ToolCallPayload>,
}

/// Handshake-complete marker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupComplete {}

/// Streaming content: audio, transcription deltas, turn lifecycle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// Agent output parts (synthesized audio).
    #[serde(default)]
    pub model_turn: Option<Content>,
    /// Caller-side transcription delta.
    #[serde(default)]
    pub input_transcription: Option<TranscriptionDelta>,
    /// Agent-side transcription delta.
    #[serde(default)]
    pub output_transcription: Option<TranscriptionDelta>,
    /// Agent turn finished.
    #[serde(default)]
    pub turn_complete: Option<bool>,
    /// Caller barge-in detected; stop playback.
    #[serde(default)]
    pub interrupted: Option<bool>,
}

/// Incremental transcription text.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionDelta {
    /// Text delta.
    pub text: String,
}

/// Tool invocation requests from the agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    /// Requested calls, in order.
    pub function_calls: Vec<FunctionCall>,
}

/// One requested tool call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Call id to echo back.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Structured arguments.
    #[serde(default)]
    pub args: Value,
}

// =============================================================================
// Tests
// =============================================================================
