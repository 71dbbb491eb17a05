//! Audio sink abstraction
//!
//! The engine drives a blocking push-style device: it hands the sink byte
//! slices at the sample clock's pace and reads back a free-running 32-bit
//! head position. Platform backends (`CoreAudio`, ALSA, ...) implement this
//! trait outside the crate.

use thiserror::Error;

/// Errors from the audio device.
///
/// [`WriteFailed`](SinkError::WriteFailed) is transient: the playback loop
/// logs it and keeps re-offering the data until it drains or the queue
/// closes, like a short or zero-length write. The other variants mean the
/// device is gone; the playback loop mutes, stops, releases the sink and
/// exits.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Device could not be opened or started
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// Device disappeared mid-stream
    #[error("device lost: {0}")]
    Lost(String),

    /// A single write failed; the data may be re-offered
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Playback state reported by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Not started, or stopped (head counter may reset)
    Stopped,
    /// Actively consuming frames
    Playing,
    /// Started but suspended
    Paused,
}

/// A blocking audio output device.
///
/// Methods take `&self`: device handles are internally synchronized, and the
/// clock polls [`playback_head_position`](AudioSink::playback_head_position)
/// concurrently with the playback thread's writes.
pub trait AudioSink: Send + Sync {
    /// Start consuming frames.
    ///
    /// # Errors
    /// Returns [`SinkError`] if the device cannot be started.
    fn play(&self) -> Result<(), SinkError>;

    /// Stop playback. The head position counter may reset to zero.
    fn stop(&self);

    /// Release the device and any OS resources. Called exactly once, after
    /// [`stop`](AudioSink::stop).
    fn release(&self);

    /// Write interleaved PCM bytes, blocking until the device accepts them.
    ///
    /// May write fewer bytes than offered; zero means "try again". The engine
    /// re-offers the remainder until it drains, including after a
    /// [`SinkError::WriteFailed`].
    ///
    /// # Errors
    /// Returns [`SinkError::WriteFailed`] for a failed write worth retrying,
    /// or another [`SinkError`] on device loss.
    fn write(&self, data: &[u8]) -> Result<usize, SinkError>;

    /// Set the linear output gain, `0.0..=1.0`.
    fn set_volume(&self, volume: f32);

    /// Free-running sample counter, modulo 2^32. Resettable by
    /// [`stop`](AudioSink::stop).
    fn playback_head_position(&self) -> u32;

    /// Current device state.
    fn play_state(&self) -> PlayState;
}
