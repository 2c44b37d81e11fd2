//! WAV decoding into normalized buffers.
//!
//! A minimal stand-in for the audio normalizer collaborator: reads any PCM or
//! float WAV, downmixes to mono, and resamples to 16kHz 16-bit.

use crate::audio::buffer::AudioBuffer;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScribeError};
use std::io::Read;
use std::path::Path;

/// Decode WAV data from any reader into a normalized buffer.
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer> {
    let wav_reader = hound::WavReader::new(reader).map_err(|e| ScribeError::AudioDecode {
        message: format!("Failed to parse WAV data: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(ScribeError::AudioDecode {
            message: "WAV header declares zero channels".to_string(),
        });
    }

    let raw_samples = read_as_i16(wav_reader, spec)?;
    let mono_samples = downmix(raw_samples, spec.channels);
    let samples = resample(&mono_samples, spec.sample_rate, SAMPLE_RATE);

    Ok(AudioBuffer::normalized(samples))
}

/// Decode a WAV file from disk.
pub fn decode_wav_file(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path)?;
    decode_wav(std::io::BufReader::new(file))
}

/// Decode WAV data piped on stdin.
pub fn decode_wav_stdin() -> Result<AudioBuffer> {
    let mut buffer = Vec::new();
    std::io::stdin().lock().read_to_end(&mut buffer)?;
    decode_wav(std::io::Cursor::new(buffer))
}

fn read_as_i16<R: Read>(mut reader: hound::WavReader<R>, spec: hound::WavSpec) -> Result<Vec<i16>> {
    let read_error = |e: hound::Error| ScribeError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    };

    match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| {
                s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .map_err(read_error)
            })
            .collect(),
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| scale_to_i16(v, bits)).map_err(read_error))
                .collect()
        }
    }
}

fn scale_to_i16(value: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (value << (16 - bits)) as i16,
        _ => (value >> (bits - 16)) as i16,
    }
}

/// Average interleaved channels into mono.
fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
