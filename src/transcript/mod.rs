//! Transcript assembly: chunk-ordered aggregation and repetition cleanup.

pub mod aggregator;
pub mod dedup;

pub use aggregator::{RecognitionResult, ResultAggregator, Transcript, aggregate};
pub use dedup::dedupe;
