// Unit tests for the silence detector
//
// The detector is level-triggered by default: once the silence window has
// elapsed it fires on every processed frame until a loud sample resets the
// timer. These tests drive it with an explicit clock.

use std::time::{Duration, Instant};
use voice_relay::audio::{AudioFrame, SilenceConfig, SilenceDetector, SilenceTrigger};

fn quiet_frame() -> AudioFrame {
    AudioFrame {
        channels: vec![vec![0.05; 160]],
        sample_rate: 16000,
    }
}

fn loud_frame() -> AudioFrame {
    let mut samples = vec![0.05; 160];
    samples[80] = 0.5;
    AudioFrame {
        channels: vec![samples],
        sample_rate: 16000,
    }
}

#[test]
fn test_no_fire_before_start() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let now = Instant::now();

    // Without start() the timer is unarmed; even a long gap cannot fire.
    assert!(!detector.feed_at(&quiet_frame(), now));
    assert!(!detector.feed_at(&quiet_frame(), now + Duration::from_secs(10)));
}

#[test]
fn test_fires_after_window_elapses() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let start = Instant::now();
    detector.start_at(start);

    assert!(!detector.feed_at(&quiet_frame(), start + Duration::from_millis(1000)));
    assert!(!detector.feed_at(&quiet_frame(), start + Duration::from_millis(1500)));
    assert!(detector.feed_at(&quiet_frame(), start + Duration::from_millis(1501)));
}

#[test]
fn test_level_trigger_refires_every_frame() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let start = Instant::now();
    detector.start_at(start);

    for i in 0..5 {
        let now = start + Duration::from_millis(1600 + i * 100);
        assert!(detector.feed_at(&quiet_frame(), now), "frame {} must fire", i);
    }
}

#[test]
fn test_loud_sample_resets_timer() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let start = Instant::now();
    detector.start_at(start);

    assert!(detector.feed_at(&quiet_frame(), start + Duration::from_millis(2000)));

    // One loud sample resets last_loud_at; the next quiet frame is silent
    // for only 100ms and must not fire.
    assert!(!detector.feed_at(&loud_frame(), start + Duration::from_millis(2100)));
    assert!(!detector.feed_at(&quiet_frame(), start + Duration::from_millis(2200)));

    // The window reopens relative to the loud sample.
    assert!(detector.feed_at(&quiet_frame(), start + Duration::from_millis(3700)));
}

#[test]
fn test_amplitude_threshold_is_strict() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let start = Instant::now();
    detector.start_at(start);

    // Samples exactly at the threshold do not count as loud.
    let at_threshold = AudioFrame {
        channels: vec![vec![0.2; 160]],
        sample_rate: 16000,
    };
    assert!(detector.feed_at(&at_threshold, start + Duration::from_millis(1600)));

    // Negative excursions beyond the threshold do.
    let negative_loud = AudioFrame {
        channels: vec![vec![-0.25; 160]],
        sample_rate: 16000,
    };
    assert!(!detector.feed_at(&negative_loud, start + Duration::from_millis(1700)));
}

#[test]
fn test_edge_trigger_fires_once_per_episode() {
    let config = SilenceConfig {
        trigger: SilenceTrigger::Edge,
        ..SilenceConfig::default()
    };
    let mut detector = SilenceDetector::new(config);
    let start = Instant::now();
    detector.start_at(start);

    assert!(detector.feed_at(&quiet_frame(), start + Duration::from_millis(1600)));
    assert!(!detector.feed_at(&quiet_frame(), start + Duration::from_millis(1700)));
    assert!(!detector.feed_at(&quiet_frame(), start + Duration::from_millis(1800)));

    // A loud sample ends the episode; the next elapsed window fires again.
    assert!(!detector.feed_at(&loud_frame(), start + Duration::from_millis(1900)));
    assert!(detector.feed_at(&quiet_frame(), start + Duration::from_millis(3500)));
}
