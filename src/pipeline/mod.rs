//! Request pipeline: bounded chunk workers, backend fallback, cancellation.

pub mod cancel;
pub mod error;
pub mod orchestrator;

pub use cancel::{CancelFlag, CancelOnDrop};
pub use error::{ChunkFailure, FailureReason};
pub use orchestrator::{
    OrchestratorSettings, TranscriptionOrchestrator, TranscriptionOutput, TranscriptionService,
    resolve_language,
};
