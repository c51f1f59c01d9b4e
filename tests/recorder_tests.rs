// Integration tests for the recorder worker
//
// The worker owns all buffering behind a command channel; these tests
// verify arrival-order accumulation, per-request responses, clearing, and
// WAV export.

use anyhow::Result;
use voice_relay::audio::{AudioFrame, RecorderConfig, RecorderHandle};

fn frame(channels: Vec<Vec<f32>>) -> AudioFrame {
    AudioFrame {
        channels,
        sample_rate: 44100,
    }
}

#[tokio::test]
async fn test_record_accumulates_in_arrival_order() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 44100,
        channels: 2,
    });

    recorder
        .record(frame(vec![vec![0.1, 0.2], vec![0.3, 0.4]]))
        .await?;
    recorder
        .record(frame(vec![vec![0.5], vec![0.6]]))
        .await?;

    let buffers = recorder.get_buffer().await?;
    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0], vec![0.1, 0.2, 0.5]);
    assert_eq!(buffers[1], vec![0.3, 0.4, 0.6]);

    // Per-channel lengths stay mutually consistent.
    assert_eq!(buffers[0].len(), buffers[1].len());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_each_get_a_response() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 44100,
        channels: 1,
    });

    recorder.record(frame(vec![vec![0.25; 8]])).await?;

    // Issue several requests before reading any response; every caller
    // must receive one.
    let a = recorder.get_buffer();
    let b = recorder.get_buffer();
    let c = recorder.export_wav();
    let (a, b, c) = tokio::join!(a, b, c);

    assert_eq!(a?[0].len(), 8);
    assert_eq!(b?[0].len(), 8);
    assert_eq!(c?.len(), 44 + 16);

    Ok(())
}

#[tokio::test]
async fn test_clear_resets_the_session() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 44100,
        channels: 1,
    });

    recorder.record(frame(vec![vec![0.1; 100]])).await?;
    recorder.clear().await?;

    let buffers = recorder.get_buffer().await?;
    assert_eq!(buffers.len(), 1);
    assert!(buffers[0].is_empty());

    // Recording resumes cleanly after a clear.
    recorder.record(frame(vec![vec![0.9; 3]])).await?;
    let buffers = recorder.get_buffer().await?;
    assert_eq!(buffers[0], vec![0.9; 3]);

    Ok(())
}

#[tokio::test]
async fn test_export_wav_interleaves_stereo() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 44100,
        channels: 2,
    });

    recorder
        .record(frame(vec![vec![1.0, 1.0], vec![-1.0, -1.0]]))
        .await?;

    let wav = recorder.export_wav().await?;

    // 4 interleaved samples, 2 bytes each
    assert_eq!(wav.len(), 44 + 8);
    assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 2);
    assert_eq!(
        &wav[44..52],
        &[0xFF, 0x7F, 0x00, 0x80, 0xFF, 0x7F, 0x00, 0x80]
    );

    Ok(())
}

#[tokio::test]
async fn test_exported_wav_reads_back() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 16000,
        channels: 1,
    });

    recorder
        .record(AudioFrame {
            channels: vec![vec![0.5; 320]],
            sample_rate: 16000,
        })
        .await?;

    let wav = recorder.export_wav().await?;

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("export.wav");
    std::fs::write(&path, &wav)?;

    let reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 320);

    Ok(())
}

#[tokio::test]
async fn test_mismatched_channel_count_is_dropped() -> Result<()> {
    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: 44100,
        channels: 2,
    });

    recorder.record(frame(vec![vec![0.5; 4]])).await?;

    let buffers = recorder.get_buffer().await?;
    assert!(buffers[0].is_empty());
    assert!(buffers[1].is_empty());

    Ok(())
}
