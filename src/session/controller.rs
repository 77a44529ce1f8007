//! Session controller.
//!
//! Owns the session lifecycle (`Idle -> Connecting -> Active -> Idle`), wires
//! the audio pipeline, transport, dispatcher, persona machine, and transcript
//! together, and exposes the UI-facing surface: `start`, `stop`, an
//! "is active" observable, the transcript, and a stream of UI events.
//!
//! Inbound transport events are consumed by a single event-loop task, one at
//! a time, preserving arrival order; outbound sends and sink calls never
//! block that loop.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::agent::live::{LiveAgentConfig, LiveAgentConnector};
use crate::core::agent::{AgentConnector, AgentEvent, AgentSession, SessionSetup};
use crate::core::audio::capture::{CaptureConfig, CaptureHandle, CaptureSource, MicSource};
use crate::core::audio::codec::{self, AudioFrame};
use crate::core::audio::output::DeviceSink;
use crate::core::audio::playback::{PlaybackScheduler, SystemClock};
use crate::core::persona::{Persona, PersonaState};
use crate::core::tools::{LeadRecord, LeadSink, NullSink, ToolDispatcher, WebhookSink, tool_declarations};
use crate::core::transcript::{SpeakerRole, TranscriptAssembler, TranscriptEntry};
use crate::errors::{EngineError, EngineResult};

/// Session lifecycle states, owned exclusively by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    /// No session; resources released.
    Idle,
    /// `start()` is acquiring the microphone and opening the transport.
    Connecting,
    /// Session live; the event loop is consuming.
    Active,
    /// `stop()` is tearing the session down.
    Closing,
}

/// Events surfaced to the UI.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The transcript log changed; take a fresh snapshot.
    TranscriptUpdated,
    /// A lead was captured.
    LeadCaptured(LeadRecord),
    /// The emergency flag actually transitioned.
    EmergencyChanged(bool),
    /// The session ended (stop, remote close, or transport error).
    SessionEnded,
}

/// State shared between the controller surface and the event-loop task.
struct Shared {
    lifecycle: Mutex<LifecycleInner>,
    active_tx: watch::Sender<bool>,
    transcript: RwLock<TranscriptAssembler>,
    persona: Mutex<PersonaState>,
    scheduler: Mutex<PlaybackScheduler>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

/// Lifecycle state plus the resources owned by the current session.
struct LifecycleInner {
    state: SessionLifecycle,
    capture: Option<Box<dyn CaptureHandle>>,
    cancel: Option<CancellationToken>,
    loop_task: Option<JoinHandle<()>>,
    text_tx: Option<mpsc::UnboundedSender<String>>,
}

impl Shared {
    /// Perform the full return-to-idle cleanup. Idempotent; callable from
    /// both `stop()` and the event loop when the transport ends the session.
    fn enter_idle(&self) {
        let (prior, capture, cancel, loop_task) = {
            let mut inner = self.lifecycle.lock();
            if inner.state == SessionLifecycle::Idle {
                return;
            }
            let prior = inner.state;
            inner.state = SessionLifecycle::Idle;
            inner.text_tx = None;
            (
                prior,
                inner.capture.take(),
                inner.cancel.take(),
                inner.loop_task.take(),
            )
        };

        // Order matters: silence the loop first so late events are
        // discarded, then release the microphone.
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(mut capture) = capture {
            capture.stop();
        }
        self.scheduler.lock().interrupt();
        self.persona.lock().reset();
        let _ = self.active_tx.send(false);
        if prior != SessionLifecycle::Connecting {
            let _ = self.ui_tx.send(UiEvent::SessionEnded);
        }
        drop(loop_task);
        info!("session idle");
    }

    fn apply_transcript(&self, role: SpeakerRole, text: String, is_final: bool) {
        let persona = match role {
            SpeakerRole::Agent => Some(self.persona.lock().active()),
            SpeakerRole::Caller => None,
        };
        {
            let mut log = self.transcript.write();
            if is_final {
                log.apply_final(role, text, persona);
            } else {
                log.apply_partial(role, text, persona);
            }
        }
        let _ = self.ui_tx.send(UiEvent::TranscriptUpdated);
    }
}

/// Top-level orchestrator and UI-facing surface.
pub struct SessionController {
    config: EngineConfig,
    shared: Arc<Shared>,
    connector: Arc<dyn AgentConnector>,
    capture_source: Mutex<Box<dyn CaptureSource>>,
    dispatcher: Arc<ToolDispatcher>,
    ui_rx: Mutex<Option<mpsc::UnboundedReceiver<UiEvent>>>,
}

impl SessionController {
    /// Build a controller against the real devices and the live agent
    /// service.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let connector = Arc::new(LiveAgentConnector::new(LiveAgentConfig {
            endpoint: config.agent.endpoint.clone(),
            api_key: config.agent.api_key.clone(),
            model: config.agent.model.clone(),
        }));

        let capture_source = Box::new(MicSource::new(CaptureConfig {
            sample_rate: config.audio.capture_sample_rate,
            frame_samples: config.audio.capture_frame_samples,
        }));

        let scheduler = PlaybackScheduler::new(
            Box::new(SystemClock::new()),
            Box::new(DeviceSink::new(config.audio.playback_sample_rate)?),
        );

        let sink: Arc<dyn LeadSink> = match &config.intake.webhook_url {
            Some(url) => Arc::new(WebhookSink::new(url.parse().map_err(|e| {
                EngineError::Config(crate::config::ConfigError::InvalidWebhookUrl(format!(
                    "{url}: {e}"
                )))
            })?)),
            None => Arc::new(NullSink),
        };

        Ok(Self::with_parts(
            config,
            connector,
            capture_source,
            scheduler,
            sink,
        ))
    }

    /// Build a controller from explicit parts. This is the seam tests use to
    /// inject a scripted transport and fake devices.
    pub fn with_parts(
        config: EngineConfig,
        connector: Arc<dyn AgentConnector>,
        capture_source: Box<dyn CaptureSource>,
        scheduler: PlaybackScheduler,
        sink: Arc<dyn LeadSink>,
    ) -> Self {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (active_tx, _active_rx) = watch::channel(false);

        let persona = PersonaState::new(
            config.personas.receptionist.clone(),
            config.personas.dispatcher.clone(),
        );

        Self {
            config,
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(LifecycleInner {
                    state: SessionLifecycle::Idle,
                    capture: None,
                    cancel: None,
                    loop_task: None,
                    text_tx: None,
                }),
                active_tx,
                transcript: RwLock::new(TranscriptAssembler::new()),
                persona: Mutex::new(persona),
                scheduler: Mutex::new(scheduler),
                ui_tx,
            }),
            connector,
            capture_source: Mutex::new(capture_source),
            dispatcher: Arc::new(ToolDispatcher::new(sink)),
            ui_rx: Mutex::new(Some(ui_rx)),
        }
    }

    /// Start a session.
    ///
    /// No-op unless `Idle`; a second call while `Connecting` or `Active`
    /// neither queues nor parallels the attempt. Microphone or connection
    /// failure surfaces here and returns the controller to `Idle`.
    pub async fn start(&self) -> EngineResult<()> {
        {
            let mut inner = self.shared.lifecycle.lock();
            if inner.state != SessionLifecycle::Idle {
                debug!(state = ?inner.state, "start ignored; session not idle");
                return Ok(());
            }
            inner.state = SessionLifecycle::Connecting;
        }

        let session_id = Uuid::new_v4();
        info!(%session_id, "starting session");
        self.shared.transcript.write().clear();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<AudioFrame>();
        let capture = match self.capture_source.lock().start(frame_tx) {
            Ok(handle) => handle,
            Err(e) => {
                error!("microphone acquisition failed: {}", e);
                self.shared.lifecycle.lock().state = SessionLifecycle::Idle;
                return Err(EngineError::Capture(e));
            }
        };

        let setup = self.build_setup();
        let (session, events) = match self.connector.open(&setup).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("agent connection failed: {}", e);
                let mut capture = capture;
                capture.stop();
                self.shared.lifecycle.lock().state = SessionLifecycle::Idle;
                return Err(EngineError::Agent(e));
            }
        };

        let cancel = CancellationToken::new();
        let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
        let loop_task = tokio::spawn(run_session_loop(
            events,
            frame_rx,
            text_rx,
            session,
            self.shared.clone(),
            self.dispatcher.clone(),
            cancel.clone(),
        ));

        {
            let mut inner = self.shared.lifecycle.lock();
            if inner.state != SessionLifecycle::Connecting {
                // stop() raced the connect; unwind without going active.
                drop(inner);
                warn!(%session_id, "session stopped while connecting");
                cancel.cancel();
                let mut capture = capture;
                capture.stop();
                return Ok(());
            }
            inner.state = SessionLifecycle::Active;
            inner.capture = Some(capture);
            inner.cancel = Some(cancel);
            inner.loop_task = Some(loop_task);
            inner.text_tx = Some(text_tx);
        }
        let _ = self.shared.active_tx.send(true);
        info!(%session_id, "session active");
        Ok(())
    }

    /// Stop the session.
    ///
    /// No-op if `Idle`. Effective immediately: the microphone is released
    /// and no further frames are sent even if the transport close handshake
    /// is still in flight; events racing the close are discarded.
    pub async fn stop(&self) {
        {
            let mut inner = self.shared.lifecycle.lock();
            if inner.state == SessionLifecycle::Idle {
                debug!("stop ignored; already idle");
                return;
            }
            inner.state = SessionLifecycle::Closing;
        }
        info!("stopping session");
        self.shared.enter_idle();
    }

    /// Send a typed caller message into the live session.
    pub fn send_text(&self, text: impl Into<String>) -> EngineResult<()> {
        let inner = self.shared.lifecycle.lock();
        match &inner.text_tx {
            Some(tx) if inner.state == SessionLifecycle::Active => {
                tx.send(text.into())
                    .map_err(|_| EngineError::Agent(crate::core::agent::AgentError::NotConnected))
            }
            _ => Err(EngineError::Agent(
                crate::core::agent::AgentError::NotConnected,
            )),
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> SessionLifecycle {
        self.shared.lifecycle.lock().state
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        *self.shared.active_tx.subscribe().borrow()
    }

    /// Observable over the active flag.
    pub fn active_changes(&self) -> watch::Receiver<bool> {
        self.shared.active_tx.subscribe()
    }

    /// Snapshot of the ordered transcript.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.transcript.read().snapshot()
    }

    /// Currently active persona.
    pub fn active_persona(&self) -> Persona {
        self.shared.persona.lock().active()
    }

    /// Label of the currently active persona.
    pub fn active_agent_label(&self) -> String {
        self.shared.persona.lock().active_profile().label.clone()
    }

    /// Whether an emergency is flagged.
    pub fn emergency_active(&self) -> bool {
        self.shared.persona.lock().emergency_active()
    }

    /// Whether agent audio is currently scheduled.
    pub fn is_audio_scheduled(&self) -> bool {
        self.shared.scheduler.lock().is_audio_scheduled()
    }

    /// Take the UI event stream. Yields `None` after the first call.
    pub fn take_ui_events(&self) -> Option<mpsc::UnboundedReceiver<UiEvent>> {
        self.ui_rx.lock().take()
    }

    fn build_setup(&self) -> SessionSetup {
        let voice = self.shared.persona.lock().active_profile().voice.clone();
        SessionSetup {
            model: self.config.agent.model.clone(),
            instructions: self.config.intake.system_instruction.clone(),
            voice,
            tools: tool_declarations(),
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}

/// The single consumer of inbound transport events.
///
/// Processes one event at a time in arrival order; forwards capture frames
/// and typed text outbound; never blocks on the sink or on playback.
async fn run_session_loop(
    mut events: mpsc::Receiver<AgentEvent>,
    mut frames: mpsc::UnboundedReceiver<AudioFrame>,
    mut texts: mpsc::UnboundedReceiver<String>,
    mut session: Box<dyn AgentSession>,
    shared: Arc<Shared>,
    dispatcher: Arc<ToolDispatcher>,
    cancel: CancellationToken,
) {
    let mut transport_ended = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("session loop cancelled");
                break;
            }

            maybe_event = events.recv() => {
                match maybe_event {
                    Some(event) => {
                        if !handle_agent_event(event, session.as_ref(), &shared, &dispatcher).await {
                            transport_ended = true;
                            break;
                        }
                    }
                    None => {
                        transport_ended = true;
                        break;
                    }
                }
            }

            Some(frame) = frames.recv() => {
                let packet = codec::encode(&frame);
                if let Err(e) = session.send_audio(packet).await {
                    warn!("failed to forward capture frame: {}", e);
                }
            }

            Some(text) = texts.recv() => {
                if let Err(e) = session.send_text(&text).await {
                    warn!("failed to send text turn: {}", e);
                }
            }
        }
    }

    let _ = session.close().await;
    if transport_ended {
        shared.enter_idle();
    }
}

/// Handle one inbound event. Returns `false` when the transport ended the
/// session.
async fn handle_agent_event(
    event: AgentEvent,
    session: &dyn AgentSession,
    shared: &Arc<Shared>,
    dispatcher: &ToolDispatcher,
) -> bool {
    match event {
        AgentEvent::Opened => {
            debug!("agent session opened");
            true
        }

        AgentEvent::AudioChunk(packet) => {
            match codec::decode(&packet, 1) {
                Ok(frame) => {
                    shared.scheduler.lock().enqueue(frame);
                }
                Err(e) => {
                    // Fatal to this packet only.
                    warn!("dropping undecodable audio chunk: {}", e);
                }
            }
            true
        }

        AgentEvent::PartialTranscript { role, text } => {
            shared.apply_transcript(role, text, false);
            true
        }

        AgentEvent::FinalTranscript { role, text } => {
            shared.apply_transcript(role, text, true);
            true
        }

        AgentEvent::ToolCall {
            call_id,
            name,
            arguments,
        } => {
            let outcome = {
                let mut persona = shared.persona.lock();
                dispatcher.dispatch(&call_id, &name, arguments, &mut persona)
            };
            if let Some(active) = outcome.emergency_change {
                let _ = shared.ui_tx.send(UiEvent::EmergencyChanged(active));
            }
            if let Some(lead) = outcome.lead {
                let _ = shared.ui_tx.send(UiEvent::LeadCaptured(lead));
            }
            if let Err(e) = session
                .send_tool_result(&outcome.ack.call_id, &outcome.ack.name, outcome.ack.result)
                .await
            {
                warn!("failed to acknowledge tool call: {}", e);
            }
            true
        }

        AgentEvent::Interrupted => {
            shared.scheduler.lock().interrupt();
            true
        }

        AgentEvent::TurnComplete => {
            shared.transcript.write().close_turn();
            true
        }

        AgentEvent::Closed => {
            info!("agent closed the session");
            false
        }

        AgentEvent::Error(message) => {
            warn!("agent transport error: {}", message);
            false
        }
    }
}
