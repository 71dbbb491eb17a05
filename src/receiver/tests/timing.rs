use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::audio::clock::AudioClock;
use crate::audio::sink::AudioSink;
use crate::audio::tests::mock::MockSink;
use crate::protocol::rtp::timing::{NtpTimestamp, TimingResponse};
use crate::receiver::timing::{TimingSynchronizer, WeightedAverage, fold_response};

fn response(reference: f64, received: f64, send_back: f64) -> TimingResponse {
    TimingResponse {
        reference_time: NtpTimestamp::from_seconds(reference),
        receive_time: NtpTimestamp::from_seconds(received),
        send_time: NtpTimestamp::from_seconds(send_back),
    }
}

#[test]
fn test_average_single_sample() {
    let mut average = WeightedAverage::new();
    assert!(average.is_empty());

    average.add(0.5, 0.001);
    assert!(!average.is_empty());
    assert!((average.get() - 0.5).abs() < 1e-12);
}

#[test]
fn test_average_two_samples() {
    let mut average = WeightedAverage::new();
    average.add(1.0, 3.0);
    average.add(2.0, 1.0);

    // (1.0 * 3.0 + 2.0 * 1.0) / 4.0
    assert!((average.get() - 1.25).abs() < 1e-12);
}

#[test]
fn test_fold_response_offset_sample() {
    let mut average = WeightedAverage::new();

    // Sender clock runs 500 s ahead; 0.5 s round trip, instant turnaround.
    let reference = 1000.0;
    let now = 1000.5;
    let remote = 1500.25;
    fold_response(&mut average, now, &response(reference, remote, remote));

    assert!((average.get() - 500.0).abs() < 1e-4);
}

#[test]
fn test_low_transit_probes_dominate() {
    let mut average = WeightedAverage::new();

    // A slow probe reporting a wild offset, then fast probes agreeing on 0.2.
    let reference = 2000.0;
    fold_response(&mut average, reference + 0.5, &response(reference, 2001.0, 2001.0));
    for i in 0..5 {
        let reference = 2010.0 + f64::from(i);
        let remote = reference + 0.2 + 0.0001;
        fold_response(
            &mut average,
            reference + 0.0002,
            &response(reference, remote, remote),
        );
    }

    // weight(0.5 s transit) ~ 2e-6 against five samples at ~8.3e-4 each.
    let estimate = average.get();
    assert!((estimate - 0.2).abs() < 0.01, "estimate drifted: {estimate}");
}

#[test]
fn test_offset_estimate_convergence() {
    let mut average = WeightedAverage::new();

    // Twenty probes with 0.1-5 ms transit, all seeing a 0.5 s offset.
    for i in 0..20 {
        let transit = 0.0001 + f64::from(i) * (0.005 - 0.0001) / 19.0;
        let reference = 100.0 + f64::from(i) * 3.0;
        let now = reference + transit;
        let remote = 0.5 * (reference + now) + 0.5;
        fold_response(&mut average, now, &response(reference, remote, remote));
    }

    assert!((average.get() - 0.5).abs() < 1e-4);
}

proptest! {
    // A single sample is returned exactly, whatever its weight.
    #[test]
    fn prop_single_add_returns_value(
        value in -1000.0f64..1000.0,
        weight in 1e-9f64..1e3,
    ) {
        let mut average = WeightedAverage::new();
        average.add(value, weight);
        prop_assert!((average.get() - value).abs() < 1e-9);
    }

    // Two samples combine to the exact weighted mean.
    #[test]
    fn prop_two_adds_weighted_mean(
        v1 in -100.0f64..100.0,
        w1 in 1e-6f64..10.0,
        v2 in -100.0f64..100.0,
        w2 in 1e-6f64..10.0,
    ) {
        let mut average = WeightedAverage::new();
        average.add(v1, w1);
        average.add(v2, w2);
        let expected = (v1 * w1 + v2 * w2) / (w1 + w2);
        prop_assert!((average.get() - expected).abs() < 1e-9);
    }
}

fn playing_clock() -> Arc<AudioClock> {
    let sink = MockSink::new();
    sink.play().unwrap();
    let clock = Arc::new(AudioClock::new(44100, sink as Arc<dyn AudioSink>));
    clock.mark_playing();
    clock
}

#[tokio::test]
async fn test_timing_loop_round_trip() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(peer.local_addr().unwrap()).await.unwrap();
    peer.connect(socket.local_addr().unwrap()).await.unwrap();

    let cancel = CancellationToken::new();
    let synchronizer = TimingSynchronizer::new(socket, playing_clock(), cancel.clone());
    let average = synchronizer.average();
    let task = tokio::spawn(synchronizer.run());

    // First probe fires as soon as the clock is running.
    let mut buf = [0u8; 64];
    let len = tokio::time::timeout(Duration::from_secs(2), peer.recv(&mut buf))
        .await
        .expect("no timing request within 2s")
        .unwrap();
    assert_eq!(len, 32);
    assert_eq!(buf[1] & 0x7F, 0x52);

    // Respond echoing the probe's send time as the reference.
    let now = NtpTimestamp::now();
    let mut reply = [0u8; 32];
    reply[0] = 0x80;
    reply[1] = 0xD3;
    reply[2] = buf[2];
    reply[3] = buf[3];
    reply[8..16].copy_from_slice(&buf[24..32]);
    reply[16..20].copy_from_slice(&now.seconds.to_be_bytes());
    reply[20..24].copy_from_slice(&now.fraction.to_be_bytes());
    reply[24..28].copy_from_slice(&now.seconds.to_be_bytes());
    reply[28..32].copy_from_slice(&now.fraction.to_be_bytes());
    peer.send(&reply).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while average.lock().unwrap().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timing response never folded in"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timing_loop_cancels_before_clock_starts() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(peer.local_addr().unwrap()).await.unwrap();

    let sink = MockSink::new();
    let clock = Arc::new(AudioClock::new(44100, sink as Arc<dyn AudioSink>));

    let cancel = CancellationToken::new();
    let synchronizer = TimingSynchronizer::new(socket, clock, cancel.clone());
    let task = tokio::spawn(synchronizer.run());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cancelled loop did not exit")
        .unwrap()
        .unwrap();
}
