//! Per-chunk failure records.
//!
//! A failed backend attempt never fails the request; it is recorded here and
//! the next backend is tried.

use crate::error::ScribeError;
use crate::stt::backend::BackendKind;
use serde::Serialize;
use std::fmt;

/// Why one backend attempt on one chunk produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The recognizer returned an error.
    Failed(String),
    /// The attempt exceeded the per-chunk timeout.
    TimedOut,
    /// The worker panicked.
    Panicked(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Failed(msg) => write!(f, "failed: {}", msg),
            FailureReason::TimedOut => write!(f, "timed out"),
            FailureReason::Panicked(msg) => write!(f, "worker panicked: {}", msg),
        }
    }
}

impl From<ScribeError> for FailureReason {
    fn from(error: ScribeError) -> Self {
        match error {
            ScribeError::ChunkTimeout { .. } => FailureReason::TimedOut,
            ScribeError::ChunkRecognition { message, .. } => FailureReason::Failed(message),
            other => FailureReason::Failed(other.to_string()),
        }
    }
}

/// One failed backend attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub backend: BackendKind,
    pub reason: FailureReason,
}

impl ChunkFailure {
    pub fn new(chunk_index: usize, backend: BackendKind, reason: FailureReason) -> Self {
        Self {
            chunk_index,
            backend,
            reason,
        }
    }

    /// Log at `warn` with structured fields.
    pub fn report(&self) {
        tracing::warn!(
            chunk = self.chunk_index,
            backend = %self.backend,
            reason = %self.reason,
            "Chunk recognition attempt failed"
        );
    }
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} on {}: {}",
            self.chunk_index, self.backend, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = ChunkFailure::new(
            3,
            BackendKind::BatchNeural,
            FailureReason::Failed("decoder exploded".to_string()),
        );
        assert_eq!(
            failure.to_string(),
            "chunk 3 on batch-neural: failed: decoder exploded"
        );

        let timeout = ChunkFailure::new(0, BackendKind::StreamingFrame, FailureReason::TimedOut);
        assert_eq!(timeout.to_string(), "chunk 0 on streaming-frame: timed out");
    }

    #[test]
    fn test_failure_serializes_to_json() {
        let failure = ChunkFailure::new(1, BackendKind::StreamingFrame, FailureReason::TimedOut);
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["chunk_index"], 1);
        assert_eq!(json["backend"], "streaming-frame");
        assert_eq!(json["reason"]["kind"], "timed_out");
    }

    #[test]
    fn test_panicked_reason_keeps_detail() {
        let reason = FailureReason::Panicked("index out of bounds".to_string());
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "panicked");
        assert_eq!(json["detail"], "index out of bounds");
    }

    #[test]
    fn test_reason_from_scribe_error() {
        let timeout = ScribeError::ChunkTimeout {
            backend: BackendKind::BatchNeural,
            chunk: 2,
            timeout_ms: 100,
        };
        assert_eq!(FailureReason::from(timeout), FailureReason::TimedOut);

        let recognition = ScribeError::ChunkRecognition {
            backend: BackendKind::StreamingFrame,
            chunk: 2,
            message: "session broke".to_string(),
        };
        assert_eq!(
            FailureReason::from(recognition),
            FailureReason::Failed("session broke".to_string())
        );

        let other = ScribeError::Inference {
            message: "bad state".to_string(),
        };
        assert_eq!(
            FailureReason::from(other),
            FailureReason::Failed("Recognition inference failed: bad state".to_string())
        );
    }

    #[test]
    fn test_report_does_not_panic() {
        ChunkFailure::new(0, BackendKind::BatchNeural, FailureReason::TimedOut).report();
    }
}
