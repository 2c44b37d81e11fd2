//! chunkscribe - chunked speech-to-text with backend fallback
//!
//! Splits normalized audio into overlapping chunks, recognizes them in
//! parallel (batch neural first, streaming-frame as fallback), and stitches
//! the results into one deduplicated transcript.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod stt;
pub mod transcript;

// Audio
pub use audio::{AudioBuffer, AudioChunk, AudioFormat, segment};

// Recognition seams (engine → adapter → registry)
pub use stt::{BackendKind, BackendRegistry, BatchEngine, ChunkRecognizer, StreamingEngine};

// Orchestration
pub use pipeline::{
    CancelFlag, ChunkFailure, TranscriptionOrchestrator, TranscriptionOutput,
    TranscriptionService,
};

// Transcript assembly
pub use transcript::{Transcript, aggregate, dedupe};

// Error handling
pub use error::{Result, ScribeError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
