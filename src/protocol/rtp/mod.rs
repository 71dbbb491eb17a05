//! RAOP RTP packet codecs

pub mod sync;
pub mod timing;


pub use sync::SyncPacket;
pub use timing::{NtpTimestamp, TimingRequest, TimingResponse};

/// Errors decoding an RTP packet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RtpDecodeError {
    /// Packet shorter than the fixed layout requires
    #[error("packet too short: needed {needed} bytes, have {have}")]
    TooShort {
        /// Bytes the layout requires
        needed: usize,
        /// Bytes available
        have: usize,
    },

    /// Payload type field did not match the expected packet kind
    #[error("unexpected packet type {0:#04x}")]
    WrongType(u8),
}
