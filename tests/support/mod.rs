//! Scripted transport, fake devices, and recording sinks shared by the
//! integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use leadline::core::agent::{
    AgentConnector, AgentError, AgentEvent, AgentResult, AgentSession, SessionSetup,
};
use leadline::core::audio::capture::{CaptureError, CaptureHandle, CaptureSource};
use leadline::core::audio::codec::AudioFrame;
use leadline::core::audio::playback::{ClipSink, OutputClock, PlaybackScheduler};
use leadline::core::tools::{LeadSink, SinkError};
use leadline::{EngineConfig, SessionController};

/// Everything a scripted session sent back toward the "remote".
#[derive(Debug, Clone, PartialEq)]
pub enum SentItem {
    Audio { mime_type: String },
    Text(String),
    ToolResult {
        call_id: String,
        name: String,
        result: Value,
    },
    Close,
}

/// Session half handed out by [`MockConnector`]; records all sends.
pub struct ScriptedSession {
    sent: Arc<Mutex<Vec<SentItem>>>,
}

#[async_trait]
impl AgentSession for ScriptedSession {
    async fn send_audio(
        &self,
        packet: leadline::core::audio::codec::WireAudioPacket,
    ) -> AgentResult<()> {
        self.sent.lock().push(SentItem::Audio {
            mime_type: packet.mime_type,
        });
        Ok(())
    }

    async fn send_text(&self, text: &str) -> AgentResult<()> {
        self.sent.lock().push(SentItem::Text(text.to_string()));
        Ok(())
    }

    async fn send_tool_result(&self, call_id: &str, name: &str, result: Value) -> AgentResult<()> {
        self.sent.lock().push(SentItem::ToolResult {
            call_id: call_id.to_string(),
            name: name.to_string(),
            result,
        });
        Ok(())
    }

    async fn close(&mut self) -> AgentResult<()> {
        self.sent.lock().push(SentItem::Close);
        Ok(())
    }
}

/// Connector whose inbound events come from a test-held channel.
pub struct MockConnector {
    events: Mutex<Option<mpsc::Receiver<AgentEvent>>>,
    pub sent: Arc<Mutex<Vec<SentItem>>>,
    pub opened: Arc<Mutex<usize>>,
    pub last_setup: Arc<Mutex<Option<SessionSetup>>>,
    pub fail: bool,
}

impl MockConnector {
    /// Build a connector plus the sender the test scripts events through.
    pub fn new() -> (Arc<Self>, mpsc::Sender<AgentEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Arc::new(Self {
                events: Mutex::new(Some(rx)),
                sent: Arc::new(Mutex::new(Vec::new())),
                opened: Arc::new(Mutex::new(0)),
                last_setup: Arc::new(Mutex::new(None)),
                fail: false,
            }),
            tx,
        )
    }

    /// Build a connector that refuses to open.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(Mutex::new(0)),
            last_setup: Arc::new(Mutex::new(None)),
            fail: true,
        })
    }

    /// Tool acknowledgements sent so far, in send order.
    pub fn tool_acks(&self) -> Vec<(String, Value)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|item| match item {
                SentItem::ToolResult {
                    call_id, result, ..
                } => Some((call_id.clone(), result.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AgentConnector for MockConnector {
    async fn open(
        &self,
        setup: &SessionSetup,
    ) -> AgentResult<(Box<dyn AgentSession>, mpsc::Receiver<AgentEvent>)> {
        if self.fail {
            return Err(AgentError::ConnectionFailed("scripted failure".to_string()));
        }
        let rx = self
            .events
            .lock()
            .take()
            .ok_or_else(|| AgentError::ConnectionFailed("already opened".to_string()))?;
        *self.opened.lock() += 1;
        *self.last_setup.lock() = Some(setup.clone());
        Ok((
            Box::new(ScriptedSession {
                sent: self.sent.clone(),
            }),
            rx,
        ))
    }
}

/// Capture source that emits a fixed set of frames and records release.
pub struct TestCapture {
    pub frames: Vec<AudioFrame>,
    pub released: Arc<Mutex<bool>>,
    pub starts: Arc<Mutex<usize>>,
    pub fail: bool,
}

impl TestCapture {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            released: Arc::new(Mutex::new(false)),
            starts: Arc::new(Mutex::new(0)),
            fail: false,
        }
    }

    pub fn with_frames(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl CaptureSource for TestCapture {
    fn start(
        &mut self,
        tx: mpsc::UnboundedSender<AudioFrame>,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        if self.fail {
            return Err(CaptureError::NoDevice);
        }
        *self.starts.lock() += 1;
        *self.released.lock() = false;
        for frame in &self.frames {
            let _ = tx.send(frame.clone());
        }
        Ok(Box::new(TestCaptureHandle {
            released: self.released.clone(),
        }))
    }
}

pub struct TestCaptureHandle {
    released: Arc<Mutex<bool>>,
}

impl CaptureHandle for TestCaptureHandle {
    fn stop(&mut self) {
        *self.released.lock() = true;
    }
}

/// Hand-advanced output clock.
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<f64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(0.0)))
    }

    pub fn advance(&self, seconds: f64) {
        *self.0.lock() += seconds;
    }
}

impl OutputClock for ManualClock {
    fn now(&self) -> f64 {
        *self.0.lock()
    }
}

/// Clip sink that records scheduling and flushes.
#[derive(Clone, Default)]
pub struct RecordingClipSink {
    pub played: Arc<Mutex<Vec<(u64, f64)>>>,
    pub stops: Arc<Mutex<usize>>,
}

impl ClipSink for RecordingClipSink {
    fn play(&mut self, clip_id: u64, _frame: &AudioFrame, start_time: f64) {
        self.played.lock().push((clip_id, start_time));
    }

    fn stop_all(&mut self) {
        *self.stops.lock() += 1;
    }
}

/// Lead sink that records payloads.
#[derive(Clone, Default)]
pub struct MemoryLeadSink {
    pub delivered: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl LeadSink for MemoryLeadSink {
    async fn deliver(&self, payload: &Value) -> Result<(), SinkError> {
        self.delivered.lock().push(payload.clone());
        Ok(())
    }
}

/// Controller wired entirely to test doubles.
pub struct TestHarness {
    pub controller: SessionController,
    pub events: mpsc::Sender<AgentEvent>,
    pub connector: Arc<MockConnector>,
    pub capture_released: Arc<Mutex<bool>>,
    pub capture_starts: Arc<Mutex<usize>>,
    pub clock: ManualClock,
    pub clip_sink: RecordingClipSink,
    pub leads: MemoryLeadSink,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_capture(TestCapture::new())
    }

    pub fn with_capture(capture: TestCapture) -> Self {
        let (connector, events) = MockConnector::new();
        let clock = ManualClock::new();
        let clip_sink = RecordingClipSink::default();
        let leads = MemoryLeadSink::default();
        let capture_released = capture.released.clone();
        let capture_starts = capture.starts.clone();

        let controller = SessionController::with_parts(
            EngineConfig::default(),
            connector.clone(),
            Box::new(capture),
            PlaybackScheduler::new(Box::new(clock.clone()), Box::new(clip_sink.clone())),
            Arc::new(leads.clone()),
        );

        Self {
            controller,
            events,
            connector,
            capture_released,
            capture_starts,
            clock,
            clip_sink,
            leads,
        }
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within two seconds");
}

/// A silent frame of the given duration.
pub fn silence(seconds: f64, sample_rate: u32) -> AudioFrame {
    AudioFrame::new(
        vec![0.0; (seconds * sample_rate as f64) as usize],
        sample_rate,
    )
}
