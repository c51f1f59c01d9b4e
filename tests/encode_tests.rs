// Unit tests for the resample/encode pipeline
//
// These pin down the exact boundary math of the box-average downsampler,
// the asymmetric PCM16 mapping, channel merging, and the WAV header layout.

use std::borrow::Cow;
use voice_relay::audio::encode::{downsample, encode_wav, merge_channels, pcm_encode, pcm_sample};

#[test]
fn test_downsample_equal_rates_is_passthrough() {
    let buffer = vec![0.1, -0.2, 0.3, -0.4];
    let result = downsample(&buffer, 44100, 44100);

    assert!(matches!(result, Cow::Borrowed(_)), "Equal rates must not copy");
    assert_eq!(result.as_ref(), buffer.as_slice());
}

#[test]
fn test_downsample_output_length_law() {
    // output length == round(L * out_rate / in_rate)
    let cases = [
        (4410usize, 44100u32, 16000u32),
        (4096, 44100, 16000),
        (1600, 48000, 16000),
        (1601, 48000, 16000),
        (7, 44100, 16000),
    ];

    for (len, in_rate, out_rate) in cases {
        let buffer = vec![0.0f32; len];
        let result = downsample(&buffer, in_rate, out_rate);
        let expected = (len as f64 * out_rate as f64 / in_rate as f64).round() as usize;
        assert_eq!(
            result.len(),
            expected,
            "len={} {}Hz->{}Hz",
            len,
            in_rate,
            out_rate
        );
    }
}

#[test]
fn test_downsample_box_average_values() {
    // 3:1 ratio averages consecutive triples
    let buffer = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let result = downsample(&buffer, 48000, 16000);

    assert_eq!(result.as_ref(), &[2.0, 5.0]);
}

#[test]
fn test_pcm_mapping_extremes() {
    assert_eq!(pcm_sample(1.0), 32767);
    assert_eq!(pcm_sample(-1.0), -32768);
    assert_eq!(pcm_sample(0.0), 0);

    // Out-of-range input clamps to the extremes
    assert_eq!(pcm_sample(2.0), 32767);
    assert_eq!(pcm_sample(-2.0), -32768);
}

#[test]
fn test_pcm_mapping_is_monotonic() {
    let mut previous = i16::MIN;
    let steps = 2000;
    for i in 0..=steps {
        let sample = -1.0 + 2.0 * i as f32 / steps as f32;
        let value = pcm_sample(sample);
        assert!(
            value >= previous,
            "mapping not monotonic at {} ({} < {})",
            sample,
            value,
            previous
        );
        previous = value;
    }
}

#[test]
fn test_pcm_encode_little_endian() {
    let bytes = pcm_encode(&[0.0, 1.0, -1.0]);
    assert_eq!(bytes, vec![0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80]);
}

#[test]
fn test_merge_channels_mono_passthrough() {
    let mono = vec![vec![0.1, 0.2, 0.3]];
    assert_eq!(merge_channels(&mono), vec![0.1, 0.2, 0.3]);
}

#[test]
fn test_merge_channels_stereo_interleaves() {
    let channels = vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]];
    assert_eq!(merge_channels(&channels), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_wav_header_layout_mono() {
    let samples = vec![0.0f32; 100];
    let sample_rate = 16000u32;
    let wav = encode_wav(&samples, sample_rate, 1).unwrap();

    let n = samples.len() as u32;
    assert_eq!(wav.len(), 44 + 2 * n as usize);

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 2 * n);
    assert_eq!(&wav[8..12], b"WAVE");
    assert_eq!(&wav[12..16], b"fmt ");
    // PCM format, one channel
    assert_eq!(u16::from_le_bytes(wav[20..22].try_into().unwrap()), 1);
    assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
    assert_eq!(
        u32::from_le_bytes(wav[24..28].try_into().unwrap()),
        sample_rate
    );
    // byte rate = rate * channels * 2, block align = channels * 2
    assert_eq!(
        u32::from_le_bytes(wav[28..32].try_into().unwrap()),
        sample_rate * 2
    );
    assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
    assert_eq!(u16::from_le_bytes(wav[34..36].try_into().unwrap()), 16);
    assert_eq!(&wav[36..40], b"data");
    assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 2 * n);
}

#[test]
fn test_wav_payload_is_pcm16() {
    let wav = encode_wav(&[1.0, -1.0], 16000, 1).unwrap();
    assert_eq!(&wav[44..48], &[0xFF, 0x7F, 0x00, 0x80]);
}
