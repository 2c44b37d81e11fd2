//! Error types for chunkscribe.

use crate::stt::backend::BackendKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    // Request-level errors
    #[error("Audio precondition violated: expected {expected}, got {actual}")]
    AudioPrecondition { expected: String, actual: String },

    #[error("No recognition backend available: {message}")]
    BackendUnavailable { message: String },

    #[error("Transcription request cancelled")]
    Cancelled,

    // Chunk-level errors (recovered by backend fallback)
    #[error("{backend} backend failed on chunk {chunk}: {message}")]
    ChunkRecognition {
        backend: BackendKind,
        chunk: usize,
        message: String,
    },

    #[error("{backend} backend timed out on chunk {chunk} after {timeout_ms}ms")]
    ChunkTimeout {
        backend: BackendKind,
        chunk: usize,
        timeout_ms: u64,
    },

    // Engine errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Recognition engine failed to initialize: {message}")]
    EngineInit { message: String },

    #[error("Recognition inference failed: {message}")]
    Inference { message: String },

    // Audio decoding (normalizer collaborator)
    #[error("Audio decoding failed: {message}")]
    AudioDecode { message: String },

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    /// Whether the error only affects one chunk attempt.
    ///
    /// Recoverable errors make the orchestrator move on to the next backend;
    /// everything else is a request-level failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScribeError::ChunkRecognition { .. }
                | ScribeError::ChunkTimeout { .. }
                | ScribeError::ModelNotFound { .. }
                | ScribeError::EngineInit { .. }
                | ScribeError::Inference { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
