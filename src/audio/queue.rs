//! Time-indexed packet queue and playback engine
//!
//! Packets are keyed by frame time in an ordered map; a dedicated playback
//! thread pulls the lowest key, decides whether it is on time, late or still
//! ahead, and keeps the sink fed with either payload or silence so the device
//! never starves. Writes are aligned to the packet's scheduled line time,
//! inserting silence across gaps and trimming overlapped leading frames.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::clock::AudioClock;
use super::format::{ChannelMode, StreamFormat};
use super::sink::{AudioSink, SinkError};
use crate::error::AirTunesError;

/// Packets scheduled further ahead than this are rejected as timing
/// anomalies.
pub const QUEUE_LENGTH_MAX_SECONDS: f64 = 10.0;

/// Scheduling error tolerated without correction, in seconds.
pub const TIMING_PRECISION: f64 = 0.001;

/// Playback queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Channel remap applied to each packet before it reaches the sink
    pub channel_mode: ChannelMode,
    /// Gain applied when the first packet plays, `0.0..=1.0`
    pub initial_gain: f32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channel_mode: ChannelMode::Stereo,
            initial_gain: 1.0,
        }
    }
}

impl QueueConfig {
    /// Set the channel remap mode.
    #[must_use]
    pub fn channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    /// Set the initial gain.
    #[must_use]
    pub fn initial_gain(mut self, gain: f32) -> Self {
        self.initial_gain = gain.clamp(0.0, 1.0);
        self
    }
}

/// Counters from the playback engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    /// Packets handed to the sink
    pub packets_played: u64,
    /// Packets dropped because their slot had passed
    pub packets_dropped_late: u64,
    /// Packets rejected as scheduled too far ahead
    pub packets_dropped_future: u64,
    /// Packets fully consumed by overlap trimming in the aligned write
    pub packets_dropped_overlap: u64,
    /// Silence packets written while idle or waiting
    pub silence_packets: u64,
}

/// State shared between the queue handle and the playback thread.
struct Shared {
    format: StreamFormat,
    channel_mode: ChannelMode,
    packets: Mutex<BTreeMap<u64, Vec<u8>>>,
    closing: AtomicBool,
    /// Requested gain as f32 bits; applied by the playback thread
    requested_gain: AtomicU32,
    stats: Mutex<QueueStats>,
}

impl Shared {
    fn closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn requested_gain(&self) -> f32 {
        f32::from_bits(self.requested_gain.load(Ordering::Acquire))
    }
}

/// Time-keyed audio packet buffer driving a blocking sink.
pub struct AudioOutputQueue {
    shared: Arc<Shared>,
    clock: Arc<AudioClock>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioOutputQueue {
    /// Open the queue over `sink` and start the playback thread.
    ///
    /// # Errors
    /// Returns [`AirTunesError`] if the playback thread cannot be spawned.
    pub fn spawn(
        format: StreamFormat,
        sink: Arc<dyn AudioSink>,
        config: QueueConfig,
    ) -> Result<Self, AirTunesError> {
        let (mut queue, engine) = Self::build(format, sink, config);
        queue.thread = Some(
            thread::Builder::new()
                .name("airtunes-playback".into())
                .spawn(move || engine.run())?,
        );
        Ok(queue)
    }

    fn build(
        format: StreamFormat,
        sink: Arc<dyn AudioSink>,
        config: QueueConfig,
    ) -> (Self, PlaybackEngine) {
        let clock = Arc::new(AudioClock::new(format.sample_rate, Arc::clone(&sink)));
        let shared = Arc::new(Shared {
            format,
            channel_mode: config.channel_mode,
            packets: Mutex::new(BTreeMap::new()),
            closing: AtomicBool::new(false),
            requested_gain: AtomicU32::new(config.initial_gain.clamp(0.0, 1.0).to_bits()),
            stats: Mutex::new(QueueStats::default()),
        });
        let engine = PlaybackEngine::new(Arc::clone(&shared), Arc::clone(&clock), sink);
        (
            Self {
                shared,
                clock,
                thread: None,
            },
            engine,
        )
    }

    /// Queue and engine without a playback thread, for step-driven tests.
    #[cfg(test)]
    pub(crate) fn detached(
        format: StreamFormat,
        sink: Arc<dyn AudioSink>,
        config: QueueConfig,
    ) -> (Self, PlaybackEngine) {
        Self::build(format, sink, config)
    }

    /// The clock this queue schedules against.
    #[must_use]
    pub fn clock(&self) -> Arc<AudioClock> {
        Arc::clone(&self.clock)
    }

    /// Schedule `samples` at frame time `frame_time`.
    ///
    /// Returns `false` when the packet cannot be placed: its slot has already
    /// passed entirely, or it is scheduled more than
    /// [`QUEUE_LENGTH_MAX_SECONDS`] ahead. A packet keyed at an already
    /// queued frame time replaces it.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn enqueue(&self, frame_time: u64, samples: Vec<u8>) -> bool {
        let format = self.shared.format;
        let packet_seconds = format.bytes_to_seconds(samples.len());
        let frames = format.bytes_to_frames(samples.len()) as i64;
        let line_time = self.clock.frame_to_line_time(frame_time);
        let next = self.clock.next_line_time() as i64;
        let delay =
            (line_time + frames - next) as f64 / f64::from(format.sample_rate);

        if delay < -packet_seconds {
            tracing::warn!(frame_time, delay, "dropping late packet");
            self.shared.stats.lock().unwrap().packets_dropped_late += 1;
            return false;
        }
        if delay > QUEUE_LENGTH_MAX_SECONDS {
            tracing::warn!(frame_time, delay, "dropping packet scheduled too far ahead");
            self.shared.stats.lock().unwrap().packets_dropped_future += 1;
            return false;
        }

        self.clock.observe_frame_time(frame_time);
        self.shared.packets.lock().unwrap().insert(frame_time, samples);
        true
    }

    /// Drop all queued packets.
    pub fn flush(&self) {
        self.shared.packets.lock().unwrap().clear();
        tracing::debug!("queue flushed");
    }

    /// Queued packet count.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.shared.packets.lock().unwrap().len()
    }

    /// Request a new output gain; the playback thread applies it before the
    /// next packet.
    pub fn set_gain(&self, gain: f32) {
        self.shared
            .requested_gain
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    /// The requested output gain.
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.shared.requested_gain()
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        *self.shared.stats.lock().unwrap()
    }

    /// Stop the playback thread and release the sink. Idempotent.
    pub fn close(&mut self) {
        self.shared.closing.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("playback thread panicked");
            }
        }
    }
}

impl Drop for AudioOutputQueue {
    fn drop(&mut self) {
        self.close();
    }
}

/// The playback side of the queue; owns the sink for the thread's lifetime.
pub(crate) struct PlaybackEngine {
    shared: Arc<Shared>,
    clock: Arc<AudioClock>,
    sink: Arc<dyn AudioSink>,
    silence: Vec<u8>,
    muted: bool,
    /// Gain last applied to the sink
    track_volume: f32,
    underrun_logged: bool,
}

impl PlaybackEngine {
    fn new(shared: Arc<Shared>, clock: Arc<AudioClock>, sink: Arc<dyn AudioSink>) -> Self {
        let silence = shared.format.silence_packet();
        Self {
            shared,
            clock,
            sink,
            silence,
            muted: false,
            track_volume: 0.0,
            underrun_logged: false,
        }
    }

    fn run(mut self) {
        match self.start() {
            Ok(()) => {
                while !self.shared.closing() {
                    if let Err(error) = self.step() {
                        tracing::warn!(%error, "audio sink fault, stopping playback");
                        break;
                    }
                }
            }
            Err(error) => tracing::error!(%error, "audio sink failed to start"),
        }
        self.shutdown();
    }

    /// Start the sink muted and pin the clock's seconds timeline.
    pub(crate) fn start(&mut self) -> Result<(), SinkError> {
        self.sink.set_volume(0.0);
        self.muted = true;
        self.track_volume = 0.0;
        self.sink.play()?;
        self.clock.mark_playing();
        tracing::info!("playback started");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.sink.set_volume(0.0);
        self.sink.stop();
        self.sink.release();
        tracing::info!("playback stopped");
    }

    /// One scheduling decision: play the head packet, drop it as late, or
    /// write one packet of silence.
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn step(&mut self) -> Result<(), SinkError> {
        let format = self.shared.format;
        let head = self
            .shared
            .packets
            .lock()
            .unwrap()
            .keys()
            .next()
            .copied();

        let Some(frame_time) = head else {
            // Stream idle: keep the device fed but quiet.
            if !self.muted {
                self.sink.set_volume(0.0);
                self.muted = true;
            }
            return self.write_silence_packet();
        };

        let line_time = self.clock.frame_to_line_time(frame_time);
        let next = self.clock.next_line_time() as i64;
        let gap = line_time - next;
        let frames_per_packet = format.frames_per_packet as i64;

        if gap < -frames_per_packet {
            self.shared.packets.lock().unwrap().remove(&frame_time);
            self.shared.stats.lock().unwrap().packets_dropped_late += 1;
            tracing::warn!(frame_time, gap, "skipping packet past its slot");
            return Ok(());
        }

        if gap < frames_per_packet {
            let Some(mut payload) = self.shared.packets.lock().unwrap().remove(&frame_time)
            else {
                // Flushed between peek and remove.
                return Ok(());
            };
            self.apply_gain();
            let aligned = payload.len() - payload.len() % format.bytes_per_frame();
            if aligned != payload.len() {
                tracing::warn!(
                    len = payload.len(),
                    "payload not a whole number of frames, truncating"
                );
                payload.truncate(aligned);
            }
            self.shared
                .channel_mode
                .apply(&mut payload, format.bytes_per_frame());
            if self.write_aligned(&payload, line_time)? {
                self.underrun_logged = false;
                self.shared.stats.lock().unwrap().packets_played += 1;
            }
            return Ok(());
        }

        // Head packet still ahead: bridge with silence.
        if !self.underrun_logged {
            tracing::debug!(frame_time, gap, "waiting for scheduled packet");
            self.underrun_logged = true;
        }
        self.write_silence_packet()
    }

    /// Apply the requested gain if it is not what the sink currently has.
    fn apply_gain(&mut self) {
        let requested = self.shared.requested_gain();
        if self.muted || (self.track_volume - requested).abs() > f32::EPSILON {
            self.sink.set_volume(requested);
            self.track_volume = requested;
            self.muted = false;
        }
    }

    /// Write `payload` so its first frame lands at line time `target`.
    ///
    /// A positive scheduling error is bridged with silence; a negative one
    /// trims the overlapped leading frames. Returns whether any of the
    /// payload reached the sink: a payload consumed entirely by the overlap
    /// is dropped and counted, not written.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    fn write_aligned(&mut self, payload: &[u8], target: i64) -> Result<bool, SinkError> {
        let format = self.shared.format;
        let mut cursor = 0usize;
        let mut target = target;

        while !self.shared.closing() {
            let end = self.clock.next_line_time() as i64;
            let err_frames = target - end;
            let err_seconds = err_frames as f64 / f64::from(format.sample_rate);

            if err_seconds.abs() <= TIMING_PRECISION {
                self.write_frames(&payload[cursor..])?;
                return Ok(true);
            }

            if err_frames > 0 {
                self.write_silence_frames(err_frames as u64)?;
            } else {
                cursor += (end - target) as usize * format.bytes_per_frame();
                target = end;
                if cursor >= payload.len() {
                    tracing::debug!("packet fully overlapped by the write head, dropping");
                    self.shared.stats.lock().unwrap().packets_dropped_overlap += 1;
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }

    fn write_silence_packet(&mut self) -> Result<(), SinkError> {
        self.shared.stats.lock().unwrap().silence_packets += 1;
        self.write_frames(&self.silence)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_silence_frames(&mut self, frames: u64) -> Result<(), SinkError> {
        let mut remaining = frames as usize * self.shared.format.bytes_per_frame();
        while remaining > 0 && !self.shared.closing() {
            let chunk = remaining.min(self.silence.len());
            self.write_frames(&self.silence[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Drain `data` into the sink, tolerating short, zero-length and failed
    /// writes, then account the written frames on the clock.
    ///
    /// Only device loss ends the drain early; a failed write is re-offered
    /// until the queue closes.
    fn write_frames(&self, data: &[u8]) -> Result<(), SinkError> {
        let mut offset = 0usize;
        let result = loop {
            if offset >= data.len() || self.shared.closing() {
                break Ok(());
            }
            match self.sink.write(&data[offset..]) {
                Ok(0) => {} // device busy, re-offer
                Ok(written) => offset += written,
                Err(SinkError::WriteFailed(reason)) => {
                    tracing::warn!(%reason, "sink write failed, retrying");
                }
                Err(error) => break Err(error),
            }
        };
        self.clock
            .advance_written((offset / self.shared.format.bytes_per_frame()) as u64);
        result
    }
}
