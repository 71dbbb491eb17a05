//! # airtunes
//!
//! A pure Rust audio engine for RAOP (`AirTunes`) receivers.
//!
//! The crate covers the timing-critical half of a receiver: estimating the
//! sender's clock offset from round-trip timing probes, mapping the sender's
//! frame timeline onto the local playback device's sample position, and a
//! time-indexed packet queue that schedules each packet at its exact sample
//! slot, filling gaps with silence and dropping packets that arrive too late.
//!
//! Signaling (RTSP), key exchange and codec decode live outside this crate;
//! audio reaches the engine as decrypted PCM via [`AudioOutputQueue::enqueue`],
//! and leaves through an [`AudioSink`] implementation supplied by the host.
//!
//! ## Example
//!
//! ```rust,no_run
//! use airtunes::{AudioOutputQueue, QueueConfig, StreamFormat};
//! # fn example(sink: std::sync::Arc<dyn airtunes::AudioSink>) -> Result<(), airtunes::AirTunesError> {
//! let format = StreamFormat::CD_QUALITY;
//! let queue = AudioOutputQueue::spawn(format, sink, QueueConfig::default())?;
//!
//! // Feed decoded packets as they arrive off the network.
//! queue.enqueue(44100, vec![0u8; format.packet_bytes()]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;

mod audio;
/// RTP packet codecs consumed by the engine
pub mod protocol;
/// Receiver-side timing and ingest
pub mod receiver;

// Re-exports
pub use audio::clock::AudioClock;
pub use audio::format::{BUFFER_SIZE_SECONDS, ChannelMode, StreamFormat};
pub use audio::queue::{
    AudioOutputQueue, QUEUE_LENGTH_MAX_SECONDS, QueueConfig, QueueStats, TIMING_PRECISION,
};
pub use audio::sink::{AudioSink, PlayState, SinkError};
pub use error::AirTunesError;
pub use receiver::decrypt::PacketDecryptor;
pub use receiver::sync::SyncHandler;
pub use receiver::timing::{TimingSynchronizer, WeightedAverage};
