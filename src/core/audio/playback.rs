//! Playback scheduler for inbound agent speech.
//!
//! Renders an ordered, gapless sequence of decoded audio chunks on an output
//! audio clock, independent of network arrival jitter. The scheduler owns the
//! clock cursor and the active-clip set; all mutation funnels through its
//! methods, and the single inbound-event consumer is the only caller while a
//! session is live.

use std::time::Instant;

use super::codec::AudioFrame;

/// Monotonic clock the output audio is scheduled against, in seconds.
pub trait OutputClock: Send {
    /// Current time on the output clock.
    fn now(&self) -> f64;
}

/// System output clock anchored at construction time.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Destination for scheduled clips (sound device, test recorder).
pub trait ClipSink: Send {
    /// Begin rendering a clip at the given start time on the output clock.
    fn play(&mut self, clip_id: u64, frame: &AudioFrame, start_time: f64);

    /// Immediately stop everything that is rendering or queued.
    fn stop_all(&mut self);
}

/// A decoded clip with its computed slot on the output clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledClip {
    /// Scheduler-assigned id.
    pub id: u64,
    /// Start time on the output clock, in seconds.
    pub start_time: f64,
    /// Clip duration in seconds.
    pub duration: f64,
}

impl ScheduledClip {
    /// Time on the output clock at which the clip finishes.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Gapless scheduler over an output clock.
///
/// Each chunk starts at `max(next_start_time, clock.now())`, after which the
/// cursor advances by the chunk duration: chunks arriving faster than real
/// time play back to back, and a late arrival falls back to "as soon as
/// possible". Completed clips are pruned against the clock, so the active set
/// never leaks.
pub struct PlaybackScheduler {
    clock: Box<dyn OutputClock>,
    sink: Box<dyn ClipSink>,
    next_start_time: f64,
    active: Vec<ScheduledClip>,
    next_clip_id: u64,
}

impl PlaybackScheduler {
    /// Create a scheduler with its cursor initialized to the clock's current
    /// time.
    pub fn new(clock: Box<dyn OutputClock>, sink: Box<dyn ClipSink>) -> Self {
        let next_start_time = clock.now();
        Self {
            clock,
            sink,
            next_start_time,
            active: Vec::new(),
            next_clip_id: 0,
        }
    }

    /// Schedule a decoded chunk for gapless playback.
    pub fn enqueue(&mut self, frame: AudioFrame) -> ScheduledClip {
        self.prune_finished();

        let start_time = self.next_start_time.max(self.clock.now());
        let clip = ScheduledClip {
            id: self.next_clip_id,
            start_time,
            duration: frame.duration(),
        };
        self.next_clip_id += 1;

        self.sink.play(clip.id, &frame, start_time);
        self.next_start_time = clip.end_time();
        self.active.push(clip.clone());

        tracing::trace!(
            clip_id = clip.id,
            start_time,
            duration = clip.duration,
            "scheduled playback clip"
        );
        clip
    }

    /// Barge-in flush: stop every active clip, clear the set, and pull the
    /// cursor back to the clock's current time so stale agent speech never
    /// outlives the caller's interruption.
    pub fn interrupt(&mut self) {
        let stopped = self.active.len();
        self.sink.stop_all();
        self.active.clear();
        self.next_start_time = self.clock.now();

        if stopped > 0 {
            tracing::debug!(stopped, "flushed scheduled playback");
        }
    }

    /// Number of clips scheduled but not yet finished.
    pub fn active_clips(&mut self) -> usize {
        self.prune_finished();
        self.active.len()
    }

    /// Whether any audio is currently scheduled.
    pub fn is_audio_scheduled(&mut self) -> bool {
        self.active_clips() > 0
    }

    /// Current cursor position on the output clock.
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    fn prune_finished(&mut self) {
        let now = self.clock.now();
        self.active.retain(|clip| clip.end_time() > now);
    }
}
