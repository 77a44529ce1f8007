//! Live agent WebSocket client.
//!
//! Implements the [`AgentConnector`]/[`AgentSession`] capability over a
//! single WebSocket to the live agent service. A writer task drains an
//! outbound channel; a reader task translates wire frames into
//! [`AgentEvent`]s, accumulating transcription deltas so downstream
//! consumers always see the cumulative text-so-far for an utterance.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::agent::base::{
    AgentConnector, AgentError, AgentEvent, AgentResult, AgentSession, SessionSetup,
};
use crate::core::audio::WireAudioPacket;
use crate::core::transcript::SpeakerRole;

use super::config::LiveAgentConfig;
use super::messages::{
    ClientContent, ClientMessage, Content, FunctionDeclaration, FunctionResponse, GenerationConfig,
    InlineData, Part, PrebuiltVoiceConfig, RealtimeInput, ServerMessage, SpeechConfig, Setup,
    ToolList, ToolResponse, TranscriptionConfig, VoiceConfig,
};

/// Capacity of the outbound frame channel.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Frames routed to the writer task.
enum OutboundFrame {
    /// A protocol message.
    Message(ClientMessage),
    /// Close the socket and stop the writer.
    Close,
}

/// Connector for the live agent service.
pub struct LiveAgentConnector {
    config: LiveAgentConfig,
}

impl LiveAgentConnector {
    /// Create a connector from connection configuration.
    pub fn new(config: LiveAgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentConnector for LiveAgentConnector {
    async fn open(
        &self,
        setup: &SessionSetup,
    ) -> AgentResult<(Box<dyn AgentSession>, mpsc::Receiver<AgentEvent>)> {
        let url = build_session_url(&self.config)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| AgentError::ConnectionFailed(e.to_string()))?;
        info!(model = %setup.model, "connected to live agent service");

        let (mut ws_sink, mut ws_read) = ws_stream.split();

        // The setup declaration must be the first frame on the socket.
        let setup_json = serde_json::to_string(&build_setup_message(&self.config.model, setup))
            .map_err(|e| AgentError::Serialization(e.to_string()))?;
        ws_sink
            .send(Message::Text(setup_json.into()))
            .await
            .map_err(|e| AgentError::WebSocket(e.to_string()))?;

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<AgentEvent>(EVENT_CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                match frame {
                    OutboundFrame::Message(message) => {
                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("failed to serialize outbound message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("failed to send WebSocket message: {}", e);
                            break;
                        }
                    }
                    OutboundFrame::Close => {
                        debug!("closing live agent socket");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut transcripts = TranscriptAccumulator::default();
            let mut closed_sent = false;

            while let Some(message) = ws_read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_message) => {
                                for event in translate(server_message, &mut transcripts) {
                                    if event_tx.send(event).await.is_err() {
                                        // Consumer is gone; nothing left to do.
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("dropping unparseable server frame: {}", e);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("live agent closed the session");
                        closed_sent = true;
                        let _ = event_tx.send(AgentEvent::Closed).await;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("live agent socket error: {}", e);
                        closed_sent = true;
                        let _ = event_tx.send(AgentEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }

            if !closed_sent {
                let _ = event_tx.send(AgentEvent::Closed).await;
            }
        });

        let session = LiveAgentSession {
            out_tx,
            writer: Some(writer),
            reader: Some(reader),
        };

        Ok((Box::new(session), event_rx))
    }
}

/// The send half of an open live agent session.
pub struct LiveAgentSession {
    out_tx: mpsc::Sender<OutboundFrame>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl LiveAgentSession {
    async fn send(&self, message: ClientMessage) -> AgentResult<()> {
        self.out_tx
            .send(OutboundFrame::Message(message))
            .await
            .map_err(|_| AgentError::NotConnected)
    }
}

#[async_trait]
impl AgentSession for LiveAgentSession {
    async fn send_audio(&self, packet: WireAudioPacket) -> AgentResult<()> {
        self.send(ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![InlineData {
                mime_type: packet.mime_type,
                data: packet.data,
            }],
        }))
        .await
    }

    async fn send_text(&self, text: &str) -> AgentResult<()> {
        self.send(ClientMessage::ClientContent(ClientContent {
            turns: vec![Content {
                parts: vec![Part {
                    text: Some(text.to_string()),
                    inline_data: None,
                }],
                role: Some("user".to_string()),
            }],
            turn_complete: true,
        }))
        .await
    }

    async fn send_tool_result(&self, call_id: &str, name: &str, result: Value) -> AgentResult<()> {
        self.send(ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: call_id.to_string(),
                name: name.to_string(),
                response: result,
            }],
        }))
        .await
    }

    async fn close(&mut self) -> AgentResult<()> {
        // Ask the writer to send a close frame; if it is already gone the
        // socket is down anyway.
        let _ = self.out_tx.send(OutboundFrame::Close).await;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        Ok(())
    }
}

/// Per-utterance transcription buffers.
///
/// The wire carries text deltas; consumers are promised cumulative
/// text-so-far, so deltas accumulate here until the utterance settles.
#[derive(Debug, Default)]
struct TranscriptAccumulator {
    caller: String,
    agent: String,
}

/// Translate one server frame into engine events, in frame order.
fn translate(message: ServerMessage, acc: &mut TranscriptAccumulator) -> Vec<AgentEvent> {
    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(AgentEvent::Opened);
    }

    if let Some(content) = message.server_content {
        if content.interrupted == Some(true) {
            events.push(AgentEvent::Interrupted);
        }

        // The first agent output of a turn settles the caller's utterance.
        let agent_output_started =
            content.model_turn.is_some() || content.output_transcription.is_some();
        if agent_output_started && !acc.caller.is_empty() {
            events.push(AgentEvent::FinalTranscript {
                role: SpeakerRole::Caller,
                text: std::mem::take(&mut acc.caller),
            });
        }

        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(inline) = part.inline_data {
                    events.push(AgentEvent::AudioChunk(WireAudioPacket {
                        data: inline.data,
                        mime_type: inline.mime_type,
                    }));
                }
            }
        }

        if let Some(delta) = content.input_transcription {
            acc.caller.push_str(&delta.text);
            events.push(AgentEvent::PartialTranscript {
                role: SpeakerRole::Caller,
                text: acc.caller.clone(),
            });
        }

        if let Some(delta) = content.output_transcription {
            acc.agent.push_str(&delta.text);
            events.push(AgentEvent::PartialTranscript {
                role: SpeakerRole::Agent,
                text: acc.agent.clone(),
            });
        }

        if content.turn_complete == Some(true) {
            if !acc.caller.is_empty() {
                events.push(AgentEvent::FinalTranscript {
                    role: SpeakerRole::Caller,
                    text: std::mem::take(&mut acc.caller),
                });
            }
            if !acc.agent.is_empty() {
                events.push(AgentEvent::FinalTranscript {
                    role: SpeakerRole::Agent,
                    text: std::mem::take(&mut acc.agent),
                });
            }
            events.push(AgentEvent::TurnComplete);
        }
    }

    if let Some(call) = message.tool_call {
        for function_call in call.function_calls {
            events.push(AgentEvent::ToolCall {
                call_id: function_call.id,
                name: function_call.name,
                arguments: function_call.args,
            });
        }
    }

    events
}

/// Build the session URL with the API key attached.
fn build_session_url(config: &LiveAgentConfig) -> AgentResult<Url> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|e| AgentError::ConnectionFailed(format!("invalid endpoint: {e}")))?;
    url.query_pairs_mut().append_pair("key", &config.api_key);
    Ok(url)
}

/// Build the setup declaration from session configuration.
fn build_setup_message(model: &str, setup: &SessionSetup) -> ClientMessage {
    let tools = if setup.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolList {
            function_declarations: setup
                .tools
                .iter()
                .map(|tool| FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                })
                .collect(),
        }]
    };

    ClientMessage::Setup(Setup {
        model: model.to_string(),
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: setup.voice.clone(),
                    },
                },
            },
        },
        system_instruction: Content::text(setup.instructions.clone()),
        tools,
        input_audio_transcription: setup.transcribe_input.then(TranscriptionConfig::default),
        output_audio_transcription: setup.transcribe_output.then(TranscriptionConfig::default),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::base::ToolDeclaration;

    fn setup() -> SessionSetup {
        SessionSetup {
            model: "models/test".to_string(),
            instructions: "Answer calls.".to_string(),
            voice: "Kore".to_string(),
            tools: vec![ToolDeclaration {
                name: "submit_lead".to_string(),
                description: "Capture lead data.".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            transcribe_input: true,
            transcribe_output: true,
        }
    }

    #[test]
    fn test_session_url_carries_api_key() {
        let url = build_session_url(&LiveAgentConfig::new("secret")).unwrap();
        assert!(url.query().unwrap().contains("key=secret"));
    }

    #[test]
    fn test_invalid_endpoint_is_connection_error() {
        let config = LiveAgentConfig {
            endpoint: "not a url".to_string(),
            api_key: String::new(),
            model: String::new(),
        };
        assert!(matches!(
            build_session_url(&config),
            Err(AgentError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn test_setup_message_declares_voice_and_tools() {
        let json = serde_json::to_value(build_setup_message("models/test", &setup())).unwrap();
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]
                ["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(
            json["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "submit_lead"
        );
        assert!(json["setup"]["inputAudioTranscription"].is_object());
        assert!(json["setup"]["outputAudioTranscription"].is_object());
    }

    #[test]
    fn test_translate_setup_complete_opens() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        let events = translate(message, &mut TranscriptAccumulator::default());
        assert!(matches!(events.as_slice(), [AgentEvent::Opened]));
    }

    #[test]
    fn test_translate_accumulates_cumulative_partials() {
        let mut acc = TranscriptAccumulator::default();

        let first: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"outputTranscription": {"text": "hi"}}}"#,
        )
        .unwrap();
        let second: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"outputTranscription": {"text": " there"}}}"#,
        )
        .unwrap();

        let _ = translate(first, &mut acc);
        let events = translate(second, &mut acc);
        match &events[0] {
            AgentEvent::PartialTranscript { role, text } => {
                assert_eq!(*role, SpeakerRole::Agent);
                assert_eq!(text, "hi there");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_translate_turn_complete_flushes_finals() {
        let mut acc = TranscriptAccumulator::default();
        acc.caller = "no heat".to_string();
        acc.agent = "on it".to_string();

        let message: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"turnComplete": true}}"#).unwrap();
        let events = translate(message, &mut acc);

        assert!(matches!(
            &events[0],
            AgentEvent::FinalTranscript { role: SpeakerRole::Caller, text } if text == "no heat"
        ));
        assert!(matches!(
            &events[1],
            AgentEvent::FinalTranscript { role: SpeakerRole::Agent, text } if text == "on it"
        ));
        assert!(matches!(events[2], AgentEvent::TurnComplete));
        assert!(acc.caller.is_empty() && acc.agent.is_empty());
    }

    #[test]
    fn test_translate_agent_output_settles_caller_utterance() {
        let mut acc = TranscriptAccumulator::default();
        acc.caller = "my furnace is dead".to_string();

        let message: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"outputTranscription": {"text": "sorry to hear"}}}"#,
        )
        .unwrap();
        let events = translate(message, &mut acc);

        assert!(matches!(
            &events[0],
            AgentEvent::FinalTranscript { role: SpeakerRole::Caller, .. }
        ));
        assert!(matches!(
            &events[1],
            AgentEvent::PartialTranscript { role: SpeakerRole::Agent, .. }
        ));
    }

    #[test]
    fn test_translate_tool_calls_preserve_order() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"toolCall": {"functionCalls": [
                {"id": "a", "name": "set_emergency_status", "args": {"active": true}},
                {"id": "b", "name": "submit_lead", "args": {}}
            ]}}"#,
        )
        .unwrap();

        let events = translate(message, &mut TranscriptAccumulator::default());
        let ids: Vec<&str> = events
            .iter()
            .map(|event| match event {
                AgentEvent::ToolCall { call_id, .. } => call_id.as_str(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_translate_interrupted_and_audio() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {
                "interrupted": true,
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}}]}
            }}"#,
        )
        .unwrap();

        let events = translate(message, &mut TranscriptAccumulator::default());
        assert!(matches!(events[0], AgentEvent::Interrupted));
        assert!(matches!(events[1], AgentEvent::AudioChunk(_)));
    }
}
