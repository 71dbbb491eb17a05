//! Timing probe packets (types 0x52 / 0x53)
//!
//! A receiver measures its offset from the sender's clock by sending timing
//! requests on the timing UDP port and reading back the three NTP timestamps
//! the sender stamps into the response.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::RtpDecodeError;

/// Timing request packet type
const TIMING_REQUEST: u8 = 0x52;
/// Timing response packet type
const TIMING_RESPONSE: u8 = 0x53;

/// Wire size of a timing packet: 8-byte header plus three NTP timestamps.
const TIMING_PACKET_SIZE: usize = 32;

/// NTP timestamp (64-bit, seconds since 1900-01-01)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NtpTimestamp {
    /// Seconds since the NTP epoch
    pub seconds: u32,
    /// Fractional seconds (1/2^32 resolution)
    pub fraction: u32,
}

impl NtpTimestamp {
    /// NTP epoch offset from the Unix epoch (seconds from 1900 to 1970)
    pub const UNIX_OFFSET: u64 = 2_208_988_800;

    /// Current wall-clock time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let seconds = duration.as_secs() + Self::UNIX_OFFSET;
        let fraction = (u64::from(duration.subsec_nanos()) << 32) / 1_000_000_000;

        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    /// Seconds since 1900 as a double.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_seconds(self) -> f64 {
        f64::from(self.seconds) + f64::from(self.fraction) / (1u64 << 32) as f64
    }

    /// Build from seconds since 1900.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_seconds(seconds: f64) -> Self {
        let whole = seconds.max(0.0);
        Self {
            seconds: whole.trunc() as u32,
            fraction: (whole.fract() * (1u64 << 32) as f64) as u32,
        }
    }

    fn put(self, buf: &mut BytesMut) {
        buf.put_u32(self.seconds);
        buf.put_u32(self.fraction);
    }

    fn get(buf: &mut impl Buf) -> Self {
        Self {
            seconds: buf.get_u32(),
            fraction: buf.get_u32(),
        }
    }
}

/// Outgoing timing request.
///
/// Only the send timestamp is populated; the sender fills the other two in
/// its response.
#[derive(Debug, Clone, Copy)]
pub struct TimingRequest {
    /// Our transmit time
    pub send_time: NtpTimestamp,
}

impl TimingRequest {
    /// Create a request stamped with `send_time`.
    #[must_use]
    pub fn new(send_time: NtpTimestamp) -> Self {
        Self { send_time }
    }

    /// Encode to the 32-byte wire layout.
    #[must_use]
    pub fn encode(&self, sequence: u16) -> Bytes {
        let mut buf = BytesMut::with_capacity(TIMING_PACKET_SIZE);
        buf.put_u8(0x80);
        buf.put_u8(TIMING_REQUEST | 0x80);
        buf.put_u16(sequence);
        buf.put_u32(0); // timestamp field, unused
        NtpTimestamp::default().put(&mut buf); // reference: zero
        NtpTimestamp::default().put(&mut buf); // receive: zero
        self.send_time.put(&mut buf);
        buf.freeze()
    }
}

/// Incoming timing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingResponse {
    /// Echo of our original send time
    pub reference_time: NtpTimestamp,
    /// When the sender received our request
    pub receive_time: NtpTimestamp,
    /// When the sender transmitted this response
    pub send_time: NtpTimestamp,
}

impl TimingResponse {
    /// Decode from the 32-byte wire layout.
    ///
    /// # Errors
    /// Returns [`RtpDecodeError`] when the packet is truncated or not a
    /// timing response.
    pub fn decode(data: &[u8]) -> Result<Self, RtpDecodeError> {
        if data.len() < TIMING_PACKET_SIZE {
            return Err(RtpDecodeError::TooShort {
                needed: TIMING_PACKET_SIZE,
                have: data.len(),
            });
        }
        let packet_type = data[1] & 0x7F;
        if packet_type != TIMING_RESPONSE {
            return Err(RtpDecodeError::WrongType(packet_type));
        }

        let mut buf = &data[8..];
        Ok(Self {
            reference_time: NtpTimestamp::get(&mut buf),
            receive_time: NtpTimestamp::get(&mut buf),
            send_time: NtpTimestamp::get(&mut buf),
        })
    }
}
