//! Normalized PCM audio buffers.

use crate::defaults;
use crate::error::{Result, ScribeError};
use std::fmt;
use std::sync::Arc;

/// Sample geometry of a PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// The only format recognition adapters accept: 16kHz mono 16-bit.
    pub const NORMALIZED: AudioFormat = AudioFormat {
        sample_rate: defaults::SAMPLE_RATE,
        channels: defaults::CHANNELS,
        bits_per_sample: defaults::BITS_PER_SAMPLE,
    };

    pub fn is_normalized(&self) -> bool {
        *self == Self::NORMALIZED
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n}ch"),
        };
        write!(
            f,
            "{}Hz {} {}-bit",
            self.sample_rate, layout, self.bits_per_sample
        )
    }
}

/// Immutable PCM buffer.
///
/// Samples sit behind an `Arc<[i16]>` so chunks can share them across worker
/// threads without copying.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    format: AudioFormat,
    samples: Arc<[i16]>,
}

impl AudioBuffer {
    /// Wrap samples in an arbitrary format. Interleaved when `channels > 1`.
    pub fn new(format: AudioFormat, samples: Vec<i16>) -> Self {
        Self {
            format,
            samples: samples.into(),
        }
    }

    /// Wrap samples that are already 16kHz mono 16-bit.
    pub fn normalized(samples: Vec<i16>) -> Self {
        Self::new(AudioFormat::NORMALIZED, samples)
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Shared handle to the sample storage.
    pub fn shared_samples(&self) -> Arc<[i16]> {
        Arc::clone(&self.samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds, rounded down.
    pub fn duration_ms(&self) -> u64 {
        let frames = self.samples.len() as u64 / self.format.channels.max(1) as u64;
        frames * 1000 / self.format.sample_rate.max(1) as u64
    }

    /// Fail with `AudioPrecondition` unless the buffer is 16kHz mono 16-bit.
    pub fn ensure_normalized(&self) -> Result<()> {
        if self.format.is_normalized() {
            Ok(())
        } else {
            Err(ScribeError::AudioPrecondition {
                expected: AudioFormat::NORMALIZED.to_string(),
                actual: self.format.to_string(),
            })
        }
    }
}
