//! Wire protocol support
//!
//! Only the RTP message kinds the audio engine consumes: timing probes and
//! sync retarget messages. RTSP signaling and stream setup live with the
//! embedding application.

pub mod rtp;
