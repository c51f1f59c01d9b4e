// Resample + encode pipeline: box-average decimation, PCM16 conversion,
// channel interleaving, and in-memory WAV export.
//
// The downsampler is deliberately a box average, not a filtered resample:
// the streaming backend only needs intelligible 16kHz speech, and the
// boundary math here defines the exact output the rest of the pipeline
// (and its tests) depend on.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::io::Cursor;

/// Downsample `buffer` from `in_rate` to `out_rate` by box-average decimation.
///
/// Equal rates pass the input through unchanged (borrowed, no copy). Otherwise
/// output index `i` is the average of every input sample whose index falls in
/// `[round(i * ratio), round((i + 1) * ratio))` where `ratio = in_rate / out_rate`,
/// and the output length is `round(len / ratio)`.
pub fn downsample(buffer: &[f32], in_rate: u32, out_rate: u32) -> Cow<'_, [f32]> {
    if in_rate == out_rate {
        return Cow::Borrowed(buffer);
    }

    let ratio = in_rate as f64 / out_rate as f64;
    let new_len = (buffer.len() as f64 / ratio).round() as usize;
    let mut result = Vec::with_capacity(new_len);

    let mut offset = 0usize;
    for i in 0..new_len {
        let next = ((i as f64 + 1.0) * ratio).round() as usize;
        let end = next.min(buffer.len());

        let mut accum = 0.0f32;
        let mut count = 0usize;
        for &sample in &buffer[offset.min(end)..end] {
            accum += sample;
            count += 1;
        }

        if count > 0 {
            result.push(accum / count as f32);
        } else {
            result.push(0.0);
        }
        offset = next;
    }

    Cow::Owned(result)
}

/// Convert one float sample in [-1, 1] to a 16-bit signed value.
///
/// Negative values scale by 32768 and non-negative by 32767, so both extremes
/// map onto the full i16 range.
pub fn pcm_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode float samples as raw PCM16, little-endian.
pub fn pcm_encode(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&pcm_sample(sample).to_le_bytes());
    }
    out
}

/// Merge per-channel buffers into one interleaved buffer.
///
/// Two channels interleave L/R sample by sample; one channel passes through.
/// All channels must have equal length.
pub fn merge_channels(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [mono] => mono.clone(),
        _ => {
            let frames = channels[0].len();
            debug_assert!(channels.iter().all(|c| c.len() == frames));

            let mut result = Vec::with_capacity(frames * channels.len());
            for i in 0..frames {
                for channel in channels {
                    result.push(channel[i]);
                }
            }
            result
        }
    }
}

/// Encode interleaved float samples as a complete WAV file in memory.
///
/// Standard 44-byte RIFF/WAVE header (16-bit PCM, little-endian fields)
/// followed by the PCM payload.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;

        for &sample in samples {
            writer
                .write_sample(pcm_sample(sample))
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}
