//! Fixed-duration chunking with trailing overlap.
//!
//! Chunks start every `max(1000, chunk_ms - overlap_ms)` milliseconds and
//! extend `chunk_ms`, clipped to the end of the buffer. Segmentation stops at
//! the first chunk that reaches the end, so the chunks cover the whole buffer
//! with no gaps and adjacent chunks share at most `overlap_ms` of audio.

use crate::audio::buffer::AudioBuffer;
use crate::defaults::MIN_STEP_MS;
use crate::error::{Result, ScribeError};
use std::ops::Range;
use std::sync::Arc;

/// A read-only window into a parent buffer.
///
/// Chunks hold a shared handle to the parent samples; no audio is copied.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Zero-based position in the request.
    pub index: usize,
    pub start_ms: u64,
    pub duration_ms: u64,
    /// True when the following chunk re-covers this chunk's trailing audio.
    pub is_overlap_tail: bool,
    source: Arc<[i16]>,
    range: Range<usize>,
}

impl AudioChunk {
    /// Build a standalone chunk over its own samples (16kHz mono).
    pub fn from_samples(index: usize, samples: Vec<i16>) -> Self {
        let len = samples.len();
        Self {
            index,
            start_ms: 0,
            duration_ms: samples_to_ms(len, crate::defaults::SAMPLE_RATE),
            is_overlap_tail: false,
            source: samples.into(),
            range: 0..len,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.source[self.range.clone()]
    }

    /// Sample range within the parent buffer.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split a normalized buffer into overlapping chunks.
///
/// # Errors
/// - `AudioPrecondition` if the buffer is not 16kHz mono 16-bit
/// - `ConfigInvalidValue` if `chunk_ms < 1000`
///
/// An `overlap_ms` at or above `chunk_ms` is accepted; the one-second minimum
/// step still applies.
pub fn segment(buffer: &AudioBuffer, chunk_ms: u32, overlap_ms: u32) -> Result<Vec<AudioChunk>> {
    buffer.ensure_normalized()?;

    if chunk_ms < MIN_STEP_MS {
        return Err(ScribeError::ConfigInvalidValue {
            key: "chunk_ms".to_string(),
            message: format!("must be at least {MIN_STEP_MS}, got {chunk_ms}"),
        });
    }

    let rate = buffer.format().sample_rate;
    let total = buffer.len();
    let source = buffer.shared_samples();

    let step_ms = chunk_ms.saturating_sub(overlap_ms).max(MIN_STEP_MS);
    let chunk_samples = ms_to_samples(chunk_ms, rate);
    let step_samples = ms_to_samples(step_ms, rate);

    let mut chunks = Vec::with_capacity(total / step_samples.max(1) + 1);
    let mut start = 0usize;

    loop {
        let end = (start + chunk_samples).min(total);
        let reaches_end = end == total;
        let next_start = start + step_samples;

        chunks.push(AudioChunk {
            index: chunks.len(),
            start_ms: samples_to_ms(start, rate),
            duration_ms: samples_to_ms(end - start, rate),
            is_overlap_tail: !reaches_end && next_start < end,
            source: Arc::clone(&source),
            range: start..end,
        });

        if reaches_end {
            break;
        }
        start = next_start;
    }

    tracing::debug!(
        chunks = chunks.len(),
        total_samples = total,
        chunk_ms,
        step_ms,
        "Segmented audio"
    );

    Ok(chunks)
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    samples as u64 * 1000 / sample_rate.max(1) as u64
}
