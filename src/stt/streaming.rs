//! Streaming (frame-by-frame) recognition adapter.
//!
//! Feeds a chunk to a fresh session in fixed-size frames and assembles the
//! committed fragments. Only the latest partial of an utterance can ever make
//! it into the output; earlier intermediate guesses are dropped.
//!
//! A non-empty accepted fragment replaces the pending partial, which is taken
//! to be an earlier guess at the same words. An empty accepted fragment, or an
//! empty session flush, commits the pending partial instead.

use crate::audio::AudioChunk;
use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::CancelFlag;
use crate::stt::backend::{BackendKind, ChunkRecognizer};
use crate::stt::engine::{StreamEvent, StreamingEngine};
use crate::stt::lazy::LazyEngine;
use std::collections::HashSet;
use std::sync::Arc;

pub struct StreamingRecognizer {
    engine: Arc<LazyEngine<dyn StreamingEngine>>,
    frame_samples: usize,
}

impl StreamingRecognizer {
    pub fn new(engine: Arc<LazyEngine<dyn StreamingEngine>>, frame_samples: usize) -> Self {
        Self {
            engine,
            frame_samples: frame_samples.max(1),
        }
    }

    /// Wrap an already-loaded engine.
    pub fn from_engine(engine: Arc<dyn StreamingEngine>, frame_samples: usize) -> Self {
        let name = engine.model_name().to_string();
        Self::new(Arc::new(LazyEngine::ready(&name, engine)), frame_samples)
    }

    fn run_session(
        &self,
        chunk: &AudioChunk,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String> {
        let engine = self.engine.get()?;
        let mut session = engine.open_session(language, cancel)?;
        let mut fragments = Fragments::default();

        for frame in chunk.samples().chunks(self.frame_samples) {
            cancel.check()?;
            match session.accept_frame(frame)? {
                StreamEvent::Partial(text) => fragments.partial(&text),
                StreamEvent::Accepted(text) => fragments.accepted(&text),
            }
        }

        cancel.check()?;
        let flushed = session.finish()?;
        fragments.flush(&flushed);

        Ok(fragments.join())
    }
}

impl ChunkRecognizer for StreamingRecognizer {
    fn kind(&self) -> BackendKind {
        BackendKind::StreamingFrame
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
        self.run_session(chunk, language, cancel)
            .map_err(|e| match e {
                ScribeError::Cancelled => ScribeError::Cancelled,
                other => ScribeError::ChunkRecognition {
                    backend: BackendKind::StreamingFrame,
                    chunk: chunk.index,
                    message: other.to_string(),
                },
            })
    }
}

/// Per-call fragment bookkeeping.
#[derive(Debug, Default)]
struct Fragments {
    seen: HashSet<String>,
    committed: Vec<String>,
    pending_partial: Option<String>,
}

impl Fragments {
    fn partial(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.pending_partial = Some(text.to_string());
        }
    }

    fn accepted(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.commit_pending();
        } else {
            self.pending_partial = None;
            self.push(text);
        }
    }

    /// Session flush text follows the same rules as an accepted fragment.
    fn flush(&mut self, text: &str) {
        self.accepted(text);
    }

    fn commit_pending(&mut self) {
        if let Some(pending) = self.pending_partial.take() {
            self.push(&pending);
        }
    }

    fn push(&mut self, text: &str) {
        if self.seen.insert(text.to_string()) {
            self.committed.push(text.to_string());
        }
    }

    fn join(self) -> String {
        self.committed.join(" ")
    }
}
