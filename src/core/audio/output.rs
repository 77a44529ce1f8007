//! Device-backed clip sink.
//!
//! Renders scheduled clips through the default output device via CPAL. The
//! device queue is strictly FIFO: queueing decoded chunks back to back
//! realizes the scheduler's computed start times, and an underrun (silence
//! fill) is exactly the scheduler's as-soon-as-possible fallback.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use super::codec::AudioFrame;
use super::playback::ClipSink;

/// Errors opening the output device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No output device is available.
    #[error("no output device available")]
    NoDevice,

    /// The output stream could not be built at the requested format.
    #[error("failed to build output stream: {0}")]
    StreamBuild(String),

    /// The output stream could not be started.
    #[error("failed to start output stream: {0}")]
    StreamStart(String),

    /// The output worker thread died before reporting readiness.
    #[error("output worker terminated before becoming ready")]
    WorkerGone,
}

/// CPAL-backed [`ClipSink`].
///
/// `cpal::Stream` is not `Send`, so the stream lives on a dedicated worker
/// thread for the sink's lifetime; the handle here is freely movable across
/// tasks. Dropping the sink tears the stream down and releases the device.
pub struct DeviceSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl DeviceSink {
    /// Open the default output device at the given mono sample rate.
    pub fn new(sample_rate: u32) -> Result<Self, PlaybackError> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), PlaybackError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let worker_queue = queue.clone();
        let join = thread::spawn(move || {
            let device = match cpal::default_host().default_output_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(PlaybackError::NoDevice));
                    return;
                }
            };

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let callback_queue = worker_queue.clone();
            let stream = match device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock();
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                move |err| {
                    warn!("output stream error: {}", err);
                },
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(PlaybackError::StreamBuild(e.to_string())));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(PlaybackError::StreamStart(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until the handle is stopped or dropped, then let the
            // stream fall out of scope to release the device.
            let _ = stop_rx.recv();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(sample_rate, "output device opened");
                Ok(Self {
                    queue,
                    stop_tx: Some(stop_tx),
                    join: Some(join),
                })
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => Err(PlaybackError::WorkerGone),
        }
    }
}

impl ClipSink for DeviceSink {
    fn play(&mut self, _clip_id: u64, frame: &AudioFrame, _start_time: f64) {
        self.queue.lock().extend(frame.samples.iter().copied());
    }

    fn stop_all(&mut self) {
        self.queue.lock().clear();
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
