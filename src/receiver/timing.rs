//! Remote clock synchronization
//!
//! A dedicated task probes the sender's timing port every three seconds and
//! folds each response into a weighted running mean of the clock offset.
//! Probes that crossed the network quickly carry the most weight, so the
//! estimate converges fast and then resists jittered samples.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::audio::clock::AudioClock;
use crate::protocol::rtp::timing::{NtpTimestamp, TimingRequest, TimingResponse};

/// Interval between timing probes.
pub const TIME_REQUEST_INTERVAL: Duration = Duration::from_millis(3000);

/// Weighted running mean of remote clock offset samples.
///
/// Weights are never normalized: earlier samples keep their mass, so the
/// mean stabilizes quickly and single outliers barely move it.
#[derive(Debug, Default)]
pub struct WeightedAverage {
    weight: f64,
    weighted_sum: f64,
}

impl WeightedAverage {
    /// Empty average.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in `value` with `weight`.
    pub fn add(&mut self, value: f64, weight: f64) {
        self.weighted_sum += value * weight;
        self.weight += weight;
    }

    /// The current mean. Meaningless before the first
    /// [`add`](WeightedAverage::add); callers check
    /// [`is_empty`](WeightedAverage::is_empty) first.
    #[must_use]
    pub fn get(&self) -> f64 {
        debug_assert!(self.weight > 0.0);
        self.weighted_sum / self.weight
    }

    /// Whether no sample has been folded in yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weight == 0.0
    }
}

/// Fold one timing response into `average`.
///
/// `now_seconds` is the local seconds time at which the response arrived.
/// The offset sample is the midpoint-to-midpoint difference between the
/// sender's receive/transmit pair and our send/receive pair; its weight
/// decays hyperbolically with the measured one-way transit cost.
pub(crate) fn fold_response(
    average: &mut WeightedAverage,
    now_seconds: f64,
    response: &TimingResponse,
) {
    let reference = response.reference_time.to_seconds();
    let received = response.receive_time.to_seconds();
    let send_back = response.send_time.to_seconds();

    let local_seconds = 0.5 * (now_seconds + reference);
    let remote_seconds = 0.5 * (received + send_back);
    let offset_sample = remote_seconds - local_seconds;

    let local_interval = now_seconds - reference;
    let remote_interval = send_back - received;
    let transmission_time = (local_interval - remote_interval).max(0.0);
    let weight = 1e-6 / (transmission_time + 1e-3);

    average.add(offset_sample, weight);
    tracing::trace!(
        offset_sample,
        transmission_time,
        weight,
        "timing sample folded"
    );
}

/// Periodic timing probe loop.
pub struct TimingSynchronizer {
    socket: UdpSocket,
    clock: Arc<AudioClock>,
    average: Arc<Mutex<WeightedAverage>>,
    cancel: CancellationToken,
    sequence: u16,
}

impl TimingSynchronizer {
    /// Create a synchronizer over `socket`, already connected to the
    /// sender's timing port.
    #[must_use]
    pub fn new(socket: UdpSocket, clock: Arc<AudioClock>, cancel: CancellationToken) -> Self {
        Self {
            socket,
            clock,
            average: Arc::new(Mutex::new(WeightedAverage::new())),
            cancel,
            sequence: 0,
        }
    }

    /// Handle to the shared offset average, for the sync handler.
    #[must_use]
    pub fn average(&self) -> Arc<Mutex<WeightedAverage>> {
        Arc::clone(&self.average)
    }

    /// Run until cancelled.
    ///
    /// The first probe waits for the playback clock to start, so that probe
    /// timestamps are drawn from the calibrated seconds timeline.
    ///
    /// # Errors
    /// Returns `std::io::Error` if the timing socket fails.
    pub async fn run(mut self) -> Result<(), std::io::Error> {
        let mut running = self.clock.running();
        tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            started = running.wait_for(|started| *started) => {
                if started.is_err() {
                    return Ok(());
                }
            }
        }

        let mut interval = tokio::time::interval(TIME_REQUEST_INTERVAL);
        let mut buf = [0u8; 64];

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => self.send_request().await?,
                received = self.socket.recv(&mut buf) => {
                    let len = received?;
                    match TimingResponse::decode(&buf[..len]) {
                        Ok(response) => self.ingest(&response),
                        Err(error) => {
                            tracing::debug!(%error, "ignoring malformed timing packet");
                        }
                    }
                }
            }
        }
        tracing::debug!("timing loop cancelled");
        Ok(())
    }

    async fn send_request(&mut self) -> Result<(), std::io::Error> {
        self.sequence = self.sequence.wrapping_add(1);
        let send_time = NtpTimestamp::from_seconds(self.clock.now_seconds_time());
        let packet = TimingRequest::new(send_time).encode(self.sequence);
        self.socket.send(&packet).await?;
        Ok(())
    }

    fn ingest(&self, response: &TimingResponse) {
        let now_seconds = self.clock.now_seconds_time();
        let mut average = self.average.lock().unwrap();
        fold_response(&mut average, now_seconds, response);
    }
}
