//! Audio engine: clock, output queue and sink abstraction

pub mod clock;
pub mod format;
pub mod queue;
pub mod sink;


pub use clock::AudioClock;
pub use format::{ChannelMode, StreamFormat};
pub use queue::{AudioOutputQueue, QueueConfig, QueueStats};
pub use sink::{AudioSink, PlayState, SinkError};
