//! Microphone capture pipeline.
//!
//! Slices the live input stream into fixed-size frames at a fixed sample
//! rate and forwards them, in capture order, to the session's outbound path.
//! The device handle is held exclusively for the session's duration and is
//! released on every exit path.

use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::codec::AudioFrame;

/// Errors acquiring or running the capture device.
///
/// Acquisition failures are fatal to session start.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No input device is available.
    #[error("no input device available")]
    NoDevice,

    /// The input stream could not be built at the requested format.
    #[error("failed to build input stream: {0}")]
    StreamBuild(String),

    /// The input stream could not be started.
    #[error("failed to start input stream: {0}")]
    StreamStart(String),

    /// The capture worker thread died before reporting readiness.
    #[error("capture worker terminated before becoming ready")]
    WorkerGone,
}

/// Capture format: sample rate and the fixed frame length in samples.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per delivered frame.
    pub frame_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 4096,
        }
    }
}

/// Source of capture frames; the seam that lets tests feed frames without
/// hardware.
pub trait CaptureSource: Send {
    /// Begin capturing, delivering frames on `frames` in capture order.
    ///
    /// Returns a handle that owns the device for the session; stopping (or
    /// dropping) the handle releases it.
    fn start(
        &mut self,
        frames: mpsc::UnboundedSender<AudioFrame>,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// Exclusive ownership of a running capture device.
pub trait CaptureHandle: Send {
    /// Stop capturing and release the device. Idempotent.
    fn stop(&mut self);
}

/// Default-microphone [`CaptureSource`] backed by CPAL.
pub struct MicSource {
    config: CaptureConfig,
}

impl MicSource {
    /// Create a source for the default input device.
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl CaptureSource for MicSource {
    fn start(
        &mut self,
        frames: mpsc::UnboundedSender<AudioFrame>,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let config = self.config;
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        // cpal::Stream is not Send, so the stream lives on its own thread and
        // the handle only signals it.
        let join = thread::spawn(move || {
            let device = match cpal::default_host().default_input_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(CaptureError::NoDevice));
                    return;
                }
            };

            let stream_config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(config.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let mut pending: Vec<f32> = Vec::with_capacity(config.frame_samples);
            let stream = match device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        pending.push(sample);
                        if pending.len() >= config.frame_samples {
                            let frame = AudioFrame::new(
                                std::mem::replace(
                                    &mut pending,
                                    Vec::with_capacity(config.frame_samples),
                                ),
                                config.sample_rate,
                            );
                            if frames.send(frame).is_err() {
                                // Session is gone; the handle will stop us.
                                return;
                            }
                        }
                    }
                },
                move |err| {
                    warn!("input stream error: {}", err);
                },
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(CaptureError::StreamBuild(e.to_string())));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::StreamStart(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until stopped; dropping the stream releases the device.
            let _ = stop_rx.recv();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    sample_rate = config.sample_rate,
                    frame_samples = config.frame_samples,
                    "microphone capture started"
                );
                Ok(Box::new(MicHandle {
                    stop_tx: Some(stop_tx),
                    join: Some(join),
                }))
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::WorkerGone),
        }
    }
}

/// Handle owning a running microphone stream.
pub struct MicHandle {
    stop_tx: Option<std_mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl CaptureHandle for MicHandle {
    fn stop(&mut self) {
        if self.stop_tx.take().is_some() {
            info!("microphone released");
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for MicHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.frame_samples, 4096);
    }
}
