//! Recognition backends and their fixed priority.

use crate::audio::AudioChunk;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::cancel::CancelFlag;
use crate::stt::batch::BatchRecognizer;
use crate::stt::engine::{BatchEngine, StreamingEngine};
use crate::stt::lazy::LazyEngine;
use crate::stt::streaming::StreamingRecognizer;
use crate::stt::whisper::WhisperEngine;
use crate::stt::whisper_stream::WhisperStreamEngine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Recognition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Whole-chunk neural decoding. Tried first.
    BatchNeural,
    /// Frame-by-frame decoding. Fallback.
    StreamingFrame,
}

impl BackendKind {
    /// Lower runs first.
    pub fn priority(self) -> u8 {
        match self {
            BackendKind::BatchNeural => 0,
            BackendKind::StreamingFrame => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::BatchNeural => "batch-neural",
            BackendKind::StreamingFrame => "streaming-frame",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Static availability of one backend, read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub available: bool,
}

/// Chunk-level recognizer seam the orchestrator drives.
///
/// Called from blocking worker threads; implementations must be safe to call
/// concurrently on different chunks.
pub trait ChunkRecognizer: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Make sure the underlying engine is loaded.
    ///
    /// Triggers the one-time load on first use. An error means the backend
    /// cannot serve this request.
    fn prepare(&self) -> Result<()>;

    /// Transcribe one chunk.
    ///
    /// # Arguments
    /// * `language` - Engine language code (`None` = auto-detect)
    /// * `cancel` - Checked at safe points; yields `Cancelled` once set
    fn recognize(
        &self,
        chunk: &AudioChunk,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String>;
}

#[derive(Clone)]
struct BackendEntry {
    descriptor: BackendDescriptor,
    recognizer: Arc<dyn ChunkRecognizer>,
}

/// Ordered set of configured backends.
///
/// Entries are kept sorted by `BackendKind::priority`, whatever order they
/// were registered in.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recognizer, enabled or not.
    pub fn register(&mut self, recognizer: Arc<dyn ChunkRecognizer>, available: bool) {
        let descriptor = BackendDescriptor {
            kind: recognizer.kind(),
            available,
        };
        self.entries.push(BackendEntry {
            descriptor,
            recognizer,
        });
        self.entries
            .sort_by_key(|entry| entry.descriptor.kind.priority());
    }

    /// Builder form of `register` for an enabled recognizer.
    pub fn with(mut self, recognizer: Arc<dyn ChunkRecognizer>) -> Self {
        self.register(recognizer, true);
        self
    }

    /// Builder form of `register` for a disabled recognizer.
    pub fn with_disabled(mut self, recognizer: Arc<dyn ChunkRecognizer>) -> Self {
        self.register(recognizer, false);
        self
    }

    /// Whisper-backed registry described by `config`.
    ///
    /// Engines are not loaded here; each loads on the first request that
    /// prepares it.
    pub fn from_config(config: &Config) -> Self {
        let whisper = config.whisper.clone();
        let batch_engine: LazyEngine<dyn BatchEngine> =
            LazyEngine::new(&format!("whisper:{}", whisper.model), move || {
                Ok(Arc::new(WhisperEngine::load(&whisper)?) as Arc<dyn BatchEngine>)
            });

        let whisper = config.whisper.clone();
        let streaming = config.streaming.clone();
        let stream_engine: LazyEngine<dyn StreamingEngine> =
            LazyEngine::new(&format!("whisper-stream:{}", streaming.model), move || {
                Ok(Arc::new(WhisperStreamEngine::load(&whisper, &streaming)?)
                    as Arc<dyn StreamingEngine>)
            });

        let mut registry = Self::new();
        registry.register(
            Arc::new(BatchRecognizer::new(Arc::new(batch_engine))),
            config.backends.batch,
        );
        registry.register(
            Arc::new(StreamingRecognizer::new(
                Arc::new(stream_engine),
                config.streaming.frame_samples,
            )),
            config.backends.streaming,
        );
        registry
    }

    /// Descriptors in priority order.
    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.entries.iter().map(|entry| entry.descriptor).collect()
    }

    /// Enabled recognizers in priority order.
    pub fn available(&self) -> Vec<Arc<dyn ChunkRecognizer>> {
        self.entries
            .iter()
            .filter(|entry| entry.descriptor.available)
            .map(|entry| Arc::clone(&entry.recognizer))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.descriptor))
            .finish()
    }
}
