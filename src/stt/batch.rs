//! Batch (whole-chunk) recognition adapter.

use crate::audio::AudioChunk;
use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::CancelFlag;
use crate::stt::backend::{BackendKind, ChunkRecognizer};
use crate::stt::engine::BatchEngine;
use crate::stt::lazy::LazyEngine;
use std::sync::Arc;

/// Runs each chunk through a shared batch engine in one call.
pub struct BatchRecognizer {
    engine: Arc<LazyEngine<dyn BatchEngine>>,
}

impl BatchRecognizer {
    pub fn new(engine: Arc<LazyEngine<dyn BatchEngine>>) -> Self {
        Self { engine }
    }

    /// Wrap an already-loaded engine.
    pub fn from_engine(engine: Arc<dyn BatchEngine>) -> Self {
        let name = engine.model_name().to_string();
        Self::new(Arc::new(LazyEngine::ready(&name, engine)))
    }
}

impl ChunkRecognizer for BatchRecognizer {
    fn kind(&self) -> BackendKind {
        BackendKind::BatchNeural
    }

    fn prepare(&self) -> Result<()> {
        self.engine.get().map(|_| ())
    }

    fn recognize(
        &self,
        chunk: &AudioChunk,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String> {
        cancel.check()?;

        if chunk.is_empty() {
            return Ok(String::new());
        }

        let failed = |e: ScribeError| match e {
            ScribeError::Cancelled => ScribeError::Cancelled,
            other => ScribeError::ChunkRecognition {
                backend: BackendKind::BatchNeural,
                chunk: chunk.index,
                message: other.to_string(),
            },
        };

        let engine = self.engine.get().map_err(failed)?;
        let text = engine
            .transcribe(chunk.samples(), language, cancel)
            .map_err(failed)?;
        Ok(text.trim().to_string())
    }
}
