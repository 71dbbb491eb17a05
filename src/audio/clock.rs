//! Audio clock: line time, frame time and seconds time
//!
//! Source of truth for the three timelines the engine moves between:
//!
//! - **line time**: sample index on the local device, zero at device start;
//! - **frame time**: sample index on the sender's timeline;
//! - **seconds time**: NTP-style seconds since 1900.
//!
//! `frame = line + frame_time_offset` holds for the current epoch and is
//! retargeted on every sync message; `seconds = seconds_time_offset +
//! line / sample_rate` is pinned once, when the device first reports
//! [`PlayState::Playing`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

use super::sink::{AudioSink, PlayState};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const SECONDS_1900_TO_1970: f64 = 2_208_988_800.0;

/// Offset and position state read as one consistent snapshot.
struct ClockState {
    /// Frames handed to the sink so far; the line time of the next write
    line_frames_written: u64,
    /// `frame_time = line_time + frame_time_offset`
    frame_time_offset: i64,
    /// `seconds_time = seconds_time_offset + line_time / sample_rate`
    seconds_time_offset: f64,
    /// Last raw 32-bit head position observed from the sink
    last_position: u32,
    /// Accumulated wrap base added to the raw head position
    position_epoch: u64,
}

/// Playback clock shared between the queue, the sync handler and the timing
/// task.
pub struct AudioClock {
    sample_rate: u32,
    sink: Arc<dyn AudioSink>,
    state: Mutex<ClockState>,
    running_tx: watch::Sender<bool>,
    /// Highest frame time ever enqueued (diagnostic)
    latest_seen_frame_time: AtomicU64,
}

impl AudioClock {
    /// Create a clock over `sink`.
    #[must_use]
    pub fn new(sample_rate: u32, sink: Arc<dyn AudioSink>) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            sample_rate,
            sink,
            state: Mutex::new(ClockState {
                line_frames_written: 0,
                frame_time_offset: 0,
                seconds_time_offset: 0.0,
                last_position: 0,
                position_epoch: 0,
            }),
            running_tx,
            latest_seen_frame_time: AtomicU64::new(0),
        }
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current device head position as a 64-bit sample index.
    ///
    /// Returns 0 until the device is playing. The sink's 32-bit counter is
    /// widened by tracking wraps: a drop from above `0x8000_0000` to below
    /// `0x7FFF_FFFF` advances the 64-bit base by 2^32.
    #[must_use]
    pub fn now_line_time(&self) -> u64 {
        if self.sink.play_state() != PlayState::Playing {
            return 0;
        }
        let mut state = self.state.lock().unwrap();
        let position = self.sink.playback_head_position();
        if position < state.last_position
            && state.last_position > 0x8000_0000
            && position < 0x7FFF_FFFF
        {
            state.position_epoch += 1 << 32;
        }
        state.last_position = position;
        state.position_epoch + u64::from(position)
    }

    /// Line time of the next sample the queue will write.
    #[must_use]
    pub fn next_line_time(&self) -> u64 {
        self.state.lock().unwrap().line_frames_written
    }

    /// Frame time at the current device head.
    #[must_use]
    pub fn now_frame_time(&self) -> u64 {
        let now = self.now_line_time();
        now.wrapping_add_signed(self.state.lock().unwrap().frame_time_offset)
    }

    /// Frame time of the next sample the queue will write.
    #[must_use]
    pub fn next_frame_time(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .line_frames_written
            .wrapping_add_signed(state.frame_time_offset)
    }

    /// Seconds time at the current device head.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn now_seconds_time(&self) -> f64 {
        let now = self.now_line_time();
        let state = self.state.lock().unwrap();
        state.seconds_time_offset + now as f64 / f64::from(self.sample_rate)
    }

    /// Seconds time of the next sample the queue will write.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn next_seconds_time(&self) -> f64 {
        let state = self.state.lock().unwrap();
        state.seconds_time_offset
            + state.line_frames_written as f64 / f64::from(self.sample_rate)
    }

    /// Seconds time at which frame `frame_time` is scheduled.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn frame_to_seconds_time(&self, frame_time: u64) -> f64 {
        let state = self.state.lock().unwrap();
        let line = frame_time as i64 - state.frame_time_offset;
        state.seconds_time_offset + line as f64 / f64::from(self.sample_rate)
    }

    /// Line time at which frame `frame_time` is scheduled.
    ///
    /// Negative when the frame predates the device timeline.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn frame_to_line_time(&self, frame_time: u64) -> i64 {
        frame_time as i64 - self.state.lock().unwrap().frame_time_offset
    }

    /// Retarget the frame timeline: frame `frame_time` plays at seconds time
    /// `seconds_time`.
    ///
    /// A `seconds_time` of exactly 0.0 means the sender's clock offset is not
    /// known yet; the frame is pinned to the current device head instead.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    pub fn set_frame_time(&self, frame_time: u64, seconds_time: f64) {
        let now_line = self.now_line_time();
        let mut state = self.state.lock().unwrap();
        let line_time = if seconds_time == 0.0 {
            now_line as i64
        } else {
            ((seconds_time - state.seconds_time_offset) * f64::from(self.sample_rate)).round()
                as i64
        };
        state.frame_time_offset = frame_time as i64 - line_time;
        tracing::debug!(
            frame_time,
            line_time,
            offset = state.frame_time_offset,
            "retargeted frame timeline"
        );
    }

    /// Record frames handed to the sink.
    pub(crate) fn advance_written(&self, frames: u64) {
        self.state.lock().unwrap().line_frames_written += frames;
    }

    /// Record the highest frame time seen on the ingest path.
    pub(crate) fn observe_frame_time(&self, frame_time: u64) {
        self.latest_seen_frame_time
            .fetch_max(frame_time, Ordering::Relaxed);
    }

    /// Highest frame time ever enqueued.
    #[must_use]
    pub fn latest_seen_frame_time(&self) -> u64 {
        self.latest_seen_frame_time.load(Ordering::Relaxed)
    }

    /// Pin the seconds timeline to the wall clock and publish the running
    /// signal. Called by the playback thread when the sink first reports
    /// [`PlayState::Playing`]; later calls are ignored.
    pub(crate) fn mark_playing(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *self.running_tx.borrow() {
                return;
            }
            let unix = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            state.seconds_time_offset = unix.as_secs_f64() + SECONDS_1900_TO_1970;
            tracing::info!(offset = state.seconds_time_offset, "seconds timeline pinned");
        }
        let _ = self.running_tx.send(true);
    }

    /// Observe the running transition; `true` once the device has started.
    #[must_use]
    pub fn running(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }
}
