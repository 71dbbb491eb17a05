//! Error types

use crate::audio::sink::SinkError;

/// Main error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum AirTunesError {
    /// The audio sink failed to start or was lost.
    #[error("audio sink error: {0}")]
    Sink(#[from] SinkError),

    /// Socket I/O failed in the timing exchange.
    #[error("timing I/O error: {0}")]
    Io(#[from] std::io::Error),
}
