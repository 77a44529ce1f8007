//! PCM codec between engine audio frames and the transport's wire encoding.
//!
//! The wire format is PCM 16-bit signed little-endian, base64 encoded, tagged
//! with a MIME-like string carrying the sample rate (`audio/pcm;rate=16000`).
//! Engine-side audio is 32-bit float in [-1.0, 1.0].

use base64::prelude::*;
use thiserror::Error;

/// Scale factor between f32 samples and 16-bit PCM.
const PCM_SCALE: f32 = 32768.0;

/// A fixed-length block of mono linear PCM samples.
///
/// Immutable once created; owned transiently by whichever pipeline stage is
/// processing it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate the frame was produced at, in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Create a frame from raw samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Frame duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Wire-encoded form of an [`AudioFrame`].
///
/// Produced by [`encode`] for the outbound path, or received from the
/// transport and consumed exactly once by [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct WireAudioPacket {
    /// Base64-encoded PCM16 LE payload.
    pub data: String,
    /// Encoding tag, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

/// Errors decoding an inbound wire packet.
///
/// Decode failures are fatal to the packet only: callers drop the packet and
/// continue the stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Payload length is not a whole number of 16-bit samples.
    #[error("truncated PCM payload: {0} bytes is not a whole number of 16-bit samples")]
    TruncatedPayload(usize),

    /// Encoding tag is not PCM or carries no parseable sample rate.
    #[error("unsupported encoding tag: {0}")]
    UnsupportedEncoding(String),

    /// Channel count of zero.
    #[error("invalid channel count: 0")]
    InvalidChannelCount,
}

/// Encode a frame into its wire form.
///
/// Out-of-range samples are clamped to [-1.0, 1.0] before quantization; a
/// bare truncating cast would wrap them into full-scale artifacts.
pub fn encode(frame: &AudioFrame) -> WireAudioPacket {
    let mut bytes = Vec::with_capacity(frame.samples.len() * 2);
    for &sample in &frame.samples {
        let value = (sample * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    WireAudioPacket {
        data: BASE64_STANDARD.encode(&bytes),
        mime_type: format!("audio/pcm;rate={}", frame.sample_rate),
    }
}

/// Decode a wire packet back into a mono frame.
///
/// For interleaved multi-channel payloads only the first channel is kept;
/// the engine is mono end to end.
pub fn decode(packet: &WireAudioPacket, channels: u16) -> Result<AudioFrame, DecodeError> {
    if channels == 0 {
        return Err(DecodeError::InvalidChannelCount);
    }

    let sample_rate = parse_sample_rate(&packet.mime_type)?;
    let bytes = BASE64_STANDARD.decode(&packet.data)?;
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::TruncatedPayload(bytes.len()));
    }

    let step = channels as usize;
    let samples = bytes
        .chunks_exact(2)
        .step_by(step)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();

    Ok(AudioFrame {
        samples,
        sample_rate,
    })
}

/// Parse the sample rate out of an `audio/pcm;rate=<hz>` tag.
fn parse_sample_rate(mime_type: &str) -> Result<u32, DecodeError> {
    let unsupported = || DecodeError::UnsupportedEncoding(mime_type.to_string());

    if !mime_type.starts_with("audio/pcm") {
        return Err(unsupported());
    }

    mime_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .next()
        .and_then(|rate| rate.parse::<u32>().ok())
        .ok_or_else(unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| ((i as f32) * 0.01).sin() * 0.8)
            .collect();
        let frame = AudioFrame::new(samples.clone(), 16_000);

        let decoded = decode(&encode(&frame), 1).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.samples.len(), samples.len());
        for (original, restored) in samples.iter().zip(&decoded.samples) {
            assert!(
                (original - restored).abs() <= 1.0 / PCM_SCALE,
                "sample diverged beyond one quantization step: {original} vs {restored}"
            );
        }
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        let frame = AudioFrame::new(vec![2.0, -3.5, 1.0, -1.0], 16_000);
        let decoded = decode(&encode(&frame), 1).unwrap();

        // Wraparound would flip the sign; clamping pins to full scale.
        assert!(decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] < -0.99);
        assert!(decoded.samples[2] > 0.99);
        assert!((decoded.samples[3] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mime_tag_carries_sample_rate() {
        let frame = AudioFrame::new(vec![0.0; 8], 24_000);
        let packet = encode(&frame);
        assert_eq!(packet.mime_type, "audio/pcm;rate=24000");

        let decoded = decode(&packet, 1).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        let packet = WireAudioPacket {
            data: "not-valid-base64!!".to_string(),
            mime_type: "audio/pcm;rate=24000".to_string(),
        };
        assert!(matches!(
            decode(&packet, 1),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_odd_byte_count_is_truncated_payload() {
        let packet = WireAudioPacket {
            data: BASE64_STANDARD.encode([0u8, 1, 2]),
            mime_type: "audio/pcm;rate=24000".to_string(),
        };
        assert!(matches!(
            decode(&packet, 1),
            Err(DecodeError::TruncatedPayload(3))
        ));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let packet = WireAudioPacket {
            data: BASE64_STANDARD.encode([0u8, 0]),
            mime_type: "audio/ogg".to_string(),
        };
        assert!(matches!(
            decode(&packet, 1),
            Err(DecodeError::UnsupportedEncoding(_))
        ));

        let no_rate = WireAudioPacket {
            data: BASE64_STANDARD.encode([0u8, 0]),
            mime_type: "audio/pcm".to_string(),
        };
        assert!(matches!(
            decode(&no_rate, 1),
            Err(DecodeError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_stereo_payload_keeps_first_channel() {
        // Interleaved L/R: left ramps, right is silence.
        let mut bytes = Vec::new();
        for i in 0..4i16 {
            bytes.extend_from_slice(&(i * 1000).to_le_bytes());
            bytes.extend_from_slice(&0i16.to_le_bytes());
        }
        let packet = WireAudioPacket {
            data: BASE64_STANDARD.encode(&bytes),
            mime_type: "audio/pcm;rate=24000".to_string(),
        };

        let decoded = decode(&packet, 2).unwrap();
        assert_eq!(decoded.samples.len(), 4);
        assert!((decoded.samples[1] - 1000.0 / PCM_SCALE).abs() < 1e-6);
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 4096], 16_000);
        assert!((frame.duration() - 0.256).abs() < 1e-9);
    }
}
