//! Audio pipeline: PCM codec, microphone capture, and gapless playback.

pub mod capture;
pub mod codec;
pub mod output;
pub mod playback;

pub use capture::{CaptureConfig, CaptureError, CaptureHandle, CaptureSource, MicSource};
pub use codec::{AudioFrame, DecodeError, WireAudioPacket};
pub use output::{DeviceSink, PlaybackError};
pub use playback::{ClipSink, OutputClock, PlaybackScheduler, ScheduledClip, SystemClock};
