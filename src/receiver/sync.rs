//! Sync message handling
//!
//! Each RAOP sync message pins one frame timestamp to the sender's wall
//! clock. With an offset estimate in hand the frame is mapped onto the local
//! seconds timeline; before the first timing response the clock falls back
//! to pinning the frame at the current device head.

use std::sync::{Arc, Mutex};

use crate::audio::clock::AudioClock;
use crate::protocol::rtp::sync::SyncPacket;

use super::timing::WeightedAverage;

/// Applies sync messages to the playback clock.
pub struct SyncHandler {
    clock: Arc<AudioClock>,
    average: Arc<Mutex<WeightedAverage>>,
}

impl SyncHandler {
    /// Create a handler retargeting `clock` with the offset estimate in
    /// `average`.
    #[must_use]
    pub fn new(clock: Arc<AudioClock>, average: Arc<Mutex<WeightedAverage>>) -> Self {
        Self { clock, average }
    }

    /// Retarget the clock from one sync message.
    pub fn handle(&self, sync: &SyncPacket) {
        let frame_time = u64::from(sync.timestamp_minus_latency);
        let average = self.average.lock().unwrap();
        if average.is_empty() {
            tracing::debug!(frame_time, "no timing samples yet, pinning to device head");
            self.clock.set_frame_time(frame_time, 0.0);
        } else {
            let local_seconds = sync.time.to_seconds() - average.get();
            self.clock.set_frame_time(frame_time, local_seconds);
        }
    }
}
