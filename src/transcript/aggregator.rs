//! Reassembly of per-chunk results in chunk order.
//!
//! Results may arrive in any order and a chunk may report several times
//! (partials before a final). The transcript always follows chunk index,
//! never arrival order.

use serde::Serialize;
use std::collections::BTreeMap;

/// One recognizer output for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub chunk_index: usize,
    pub text: String,
    pub is_final: bool,
    /// Position among the results reported for the same chunk.
    pub order_within_chunk: u32,
}

impl RecognitionResult {
    /// Final result, the only one reported for its chunk.
    pub fn final_text(chunk_index: usize, text: impl Into<String>) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            is_final: true,
            order_within_chunk: 0,
        }
    }

    /// Whether `self` should replace `other` for the same chunk.
    fn supersedes(&self, other: &RecognitionResult) -> bool {
        (self.is_final, self.order_within_chunk) > (other.is_final, other.order_within_chunk)
    }
}

/// Ordered per-chunk texts, one entry per chunk index with no gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    pub segments: Vec<String>,
}

impl Transcript {
    /// Non-empty segments joined by single spaces.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Collects results for a request with a known chunk count.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    expected: usize,
    results: BTreeMap<usize, RecognitionResult>,
}

impl ResultAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results: BTreeMap::new(),
        }
    }

    /// Record a result. Finals beat partials; among equals the later order wins.
    pub fn accept(&mut self, result: RecognitionResult) {
        match self.results.get(&result.chunk_index) {
            Some(current) if !result.supersedes(current) => {}
            _ => {
                self.results.insert(result.chunk_index, result);
            }
        }
    }

    /// Number of chunks with at least one result.
    pub fn received(&self) -> usize {
        self.results.len()
    }

    /// Build the transcript. Chunks with no result contribute `""`.
    pub fn finish(mut self) -> Transcript {
        let len = self
            .results
            .keys()
            .next_back()
            .map_or(self.expected, |&last| self.expected.max(last + 1));

        let segments = (0..len)
            .map(|index| {
                self.results
                    .remove(&index)
                    .map(|r| r.text.trim().to_string())
                    .unwrap_or_default()
            })
            .collect();

        Transcript { segments }
    }
}

/// Order `(chunk_index, text)` pairs into a transcript.
pub fn aggregate<I>(results: I) -> Transcript
where
    I: IntoIterator<Item = (usize, String)>,
{
    let mut aggregator = ResultAggregator::new(0);
    for (index, text) in results {
        aggregator.accept(RecognitionResult::final_text(index, text));
    }
    aggregator.finish()
}
