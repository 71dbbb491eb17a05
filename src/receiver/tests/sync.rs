use std::sync::{Arc, Mutex};

use crate::audio::clock::AudioClock;
use crate::audio::sink::AudioSink;
use crate::audio::tests::mock::MockSink;
use crate::protocol::rtp::sync::SyncPacket;
use crate::protocol::rtp::timing::NtpTimestamp;
use crate::receiver::sync::SyncHandler;
use crate::receiver::timing::WeightedAverage;

fn sync_packet(timestamp_minus_latency: u32, time: f64) -> SyncPacket {
    SyncPacket {
        extension: false,
        timestamp_minus_latency,
        time: NtpTimestamp::from_seconds(time),
        timestamp: timestamp_minus_latency + 11025,
    }
}

#[test]
fn test_sync_before_first_timing_response_pins_to_head() {
    let sink = MockSink::new();
    sink.play().unwrap();
    sink.script_head_positions(&[5000]);
    let clock = Arc::new(AudioClock::new(44100, Arc::clone(&sink) as Arc<dyn AudioSink>));
    clock.mark_playing();

    let average = Arc::new(Mutex::new(WeightedAverage::new()));
    let handler = SyncHandler::new(Arc::clone(&clock), average);

    handler.handle(&sync_packet(7000, 12345.0));

    // No offset estimate: frame 7000 lands at the current device head.
    assert_eq!(clock.frame_to_line_time(7000), 5000);
}

#[test]
fn test_sync_with_offset_estimate_retargets_clock() {
    let sink = MockSink::new();
    sink.play().unwrap();
    let clock = Arc::new(AudioClock::new(44100, Arc::clone(&sink) as Arc<dyn AudioSink>));
    clock.mark_playing();

    let average = Arc::new(Mutex::new(WeightedAverage::new()));
    average.lock().unwrap().add(0.25, 0.001);
    let handler = SyncHandler::new(Arc::clone(&clock), Arc::clone(&average));

    // Sender says frame 123456 plays at remote time base + 1.25; with a
    // 0.25 s remote offset that is local time base + 1.0, one second in.
    let base = clock.next_seconds_time();
    handler.handle(&sync_packet(123_456, base + 1.25));

    assert_eq!(clock.frame_to_line_time(123_456), 44100);
}

#[test]
fn test_sync_retarget_round_trip_seconds() {
    let sink = MockSink::new();
    sink.play().unwrap();
    let clock = Arc::new(AudioClock::new(44100, Arc::clone(&sink) as Arc<dyn AudioSink>));
    clock.mark_playing();

    let average = Arc::new(Mutex::new(WeightedAverage::new()));
    average.lock().unwrap().add(-0.125, 0.001);
    let handler = SyncHandler::new(Arc::clone(&clock), Arc::clone(&average));

    let base = clock.next_seconds_time();
    handler.handle(&sync_packet(88_200, base + 2.0 - 0.125));

    let seconds = clock.frame_to_seconds_time(88_200);
    assert!((seconds - (base + 2.0)).abs() < 1.0 / 44100.0);
}
