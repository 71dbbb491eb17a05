//! Sync packets (type 0x54)
//!
//! Periodic retarget messages from the sender: "frame X, less the configured
//! latency, should be leaving the speaker at sender-clock time T".

use super::RtpDecodeError;
use super::timing::NtpTimestamp;

/// Sync packet type
const SYNC: u8 = 0x54;

/// Wire size: 4-byte header, frame time, NTP time, frame time again.
const SYNC_PACKET_SIZE: usize = 20;

/// Sync message from the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacket {
    /// Extension bit; set on the first sync after a flush
    pub extension: bool,
    /// Frame timestamp minus the negotiated latency
    pub timestamp_minus_latency: u32,
    /// Sender wall-clock time for that frame
    pub time: NtpTimestamp,
    /// Frame timestamp at `time`
    pub timestamp: u32,
}

impl SyncPacket {
    /// Decode from the 20-byte wire layout.
    ///
    /// # Errors
    /// Returns [`RtpDecodeError`] when the packet is truncated or not a sync
    /// message.
    pub fn decode(data: &[u8]) -> Result<Self, RtpDecodeError> {
        if data.len() < SYNC_PACKET_SIZE {
            return Err(RtpDecodeError::TooShort {
                needed: SYNC_PACKET_SIZE,
                have: data.len(),
            });
        }
        let packet_type = data[1] & 0x7F;
        if packet_type != SYNC {
            return Err(RtpDecodeError::WrongType(packet_type));
        }

        let timestamp_minus_latency = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let time = NtpTimestamp {
            seconds: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            fraction: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
        };
        let timestamp = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);

        Ok(Self {
            extension: data[0] & 0x10 != 0,
            timestamp_minus_latency,
            time,
            timestamp,
        })
    }
}
