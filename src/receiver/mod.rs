//! Receiver-side timing and ingest
//!
//! The pieces that sit between the network and the audio engine: the timing
//! probe loop estimating the sender's clock offset, the sync handler that
//! retargets the playback clock, and the per-packet decrypt filter.

pub mod decrypt;
pub mod sync;
pub mod timing;

#[cfg(test)]
mod tests;

pub use decrypt::PacketDecryptor;
pub use sync::SyncHandler;
pub use timing::{TimingSynchronizer, WeightedAverage};
