//! Request orchestration: segment, recognize with fallback, reassemble.
//!
//! Chunks are recognized on a bounded pool. A pool slot is held by the
//! blocking recognizer call itself, so an attempt that outlives its timeout
//! keeps its slot until the engine returns. Each chunk tries the available
//! backends in priority order; an error, timeout or panic on one backend
//! falls through to the next, and a chunk no backend could handle contributes
//! an empty segment. Output order depends only on chunk index.

use crate::audio::{AudioBuffer, AudioChunk, segment};
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::{CancelFlag, CancelOnDrop};
use crate::pipeline::error::{ChunkFailure, FailureReason};
use crate::stt::backend::{BackendRegistry, ChunkRecognizer};
use crate::transcript::{RecognitionResult, ResultAggregator, dedupe};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// Result of one transcription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionOutput {
    pub text: String,
    /// Resolved language tag, e.g. `pt-BR`.
    pub language: String,
    pub chunk_count: usize,
    /// Backend attempts that produced no text. Empty on a clean run.
    pub failures: Vec<ChunkFailure>,
}

/// Transcription seam for request handlers.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe a normalized buffer.
    ///
    /// `language_hint` may be empty or `auto`, in which case the configured
    /// default language is reported.
    async fn transcribe(
        &self,
        audio: AudioBuffer,
        language_hint: &str,
    ) -> Result<TranscriptionOutput>;
}

/// Request-level settings, read once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub chunk_ms: u32,
    pub overlap_ms: u32,
    pub chunk_timeout: Duration,
    /// Concurrent chunk recognitions.
    pub workers: usize,
    pub default_language: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            chunk_ms: defaults::CHUNK_MS,
            overlap_ms: defaults::OVERLAP_MS,
            chunk_timeout: Duration::from_millis(defaults::CHUNK_TIMEOUT_MS),
            workers: defaults::default_workers(),
            default_language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_ms: config.transcription.chunk_ms,
            overlap_ms: config.transcription.overlap_ms,
            chunk_timeout: Duration::from_millis(config.transcription.chunk_timeout_ms),
            workers: config.workers(),
            default_language: config.transcription.language.clone(),
        }
    }
}

/// Resolve the reported language and the engine language code.
///
/// The hint wins unless it is empty or `auto`. The engine code is the primary
/// subtag (`pt-BR` → `pt`); `auto` maps to `None` (engine detects).
pub fn resolve_language(hint: &str, default_language: &str) -> (String, Option<String>) {
    let hint = hint.trim();
    let resolved = if hint.is_empty() || hint.eq_ignore_ascii_case(defaults::AUTO_LANGUAGE) {
        default_language.trim()
    } else {
        hint
    };

    let code = if resolved.is_empty() || resolved.eq_ignore_ascii_case(defaults::AUTO_LANGUAGE) {
        None
    } else {
        resolved
            .split(['-', '_'])
            .next()
            .map(|primary| primary.to_ascii_lowercase())
    };

    (resolved.to_string(), code)
}

/// What one chunk produced.
#[derive(Debug)]
struct ChunkOutcome {
    index: usize,
    text: String,
    failures: Vec<ChunkFailure>,
}

/// Chunked, fault-tolerant transcription over a backend registry.
#[derive(Debug, Clone)]
pub struct TranscriptionOrchestrator {
    registry: BackendRegistry,
    settings: OrchestratorSettings,
}

impl TranscriptionOrchestrator {
    pub fn new(registry: BackendRegistry, settings: OrchestratorSettings) -> Self {
        Self { registry, settings }
    }

    /// Whisper-backed orchestrator described by `config`. Models load lazily.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BackendRegistry::from_config(config),
            OrchestratorSettings::from(config),
        )
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Transcribe `audio`. Dropping the returned future cancels every
    /// in-flight chunk.
    pub async fn transcribe(
        &self,
        audio: AudioBuffer,
        language_hint: &str,
    ) -> Result<TranscriptionOutput> {
        self.transcribe_with_cancel(audio, language_hint, CancelFlag::new())
            .await
    }

    /// Transcribe `audio`, stopping early once `cancel` is set.
    ///
    /// # Errors
    /// - `AudioPrecondition` if the buffer is not 16kHz mono 16-bit
    /// - `BackendUnavailable` if no enabled backend could be prepared
    /// - `Cancelled` if `cancel` was set before the request completed
    #[tracing::instrument(skip_all, fields(samples = audio.len(), hint = %language_hint))]
    pub async fn transcribe_with_cancel(
        &self,
        audio: AudioBuffer,
        language_hint: &str,
        cancel: CancelFlag,
    ) -> Result<TranscriptionOutput> {
        let request = cancel.child();
        let _guard = CancelOnDrop::new(request.clone());

        audio.ensure_normalized()?;
        let started = Instant::now();
        let (language, code) =
            resolve_language(language_hint, &self.settings.default_language);

        let backends = self.prepare_backends().await?;
        let chunks = segment(&audio, self.settings.chunk_ms, self.settings.overlap_ms)?;
        let chunk_count = chunks.len();

        tracing::info!(
            chunks = chunk_count,
            duration_ms = audio.duration_ms(),
            backends = backends.len(),
            workers = self.settings.workers,
            language = %language,
            "Transcription started"
        );

        let (segments, failures) = self.run_chunks(chunks, backends, code, &request).await?;
        request.check()?;

        let text = dedupe(&segments.text());

        tracing::info!(
            chunks = chunk_count,
            failures = failures.len(),
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcription finished"
        );

        Ok(TranscriptionOutput {
            text,
            language,
            chunk_count,
            failures,
        })
    }

    /// Load every enabled backend and keep the ones that came up.
    async fn prepare_backends(&self) -> Result<Vec<Arc<dyn ChunkRecognizer>>> {
        let enabled = self.registry.available();
        if enabled.is_empty() {
            return Err(ScribeError::BackendUnavailable {
                message: "no recognition backend is enabled".to_string(),
            });
        }

        let mut ready = Vec::with_capacity(enabled.len());
        let mut problems = Vec::new();

        for recognizer in enabled {
            let kind = recognizer.kind();
            let probe = Arc::clone(&recognizer);
            match tokio::task::spawn_blocking(move || probe.prepare()).await {
                Ok(Ok(())) => ready.push(recognizer),
                Ok(Err(e)) => {
                    tracing::warn!(backend = %kind, error = %e, "Backend unavailable for this request");
                    problems.push(format!("{kind}: {e}"));
                }
                Err(e) => {
                    tracing::warn!(backend = %kind, error = %e, "Backend preparation panicked");
                    problems.push(format!("{kind}: {}", panic_message(e)));
                }
            }
        }

        if ready.is_empty() {
            return Err(ScribeError::BackendUnavailable {
                message: problems.join("; "),
            });
        }
        Ok(ready)
    }

    async fn run_chunks(
        &self,
        chunks: Vec<AudioChunk>,
        backends: Vec<Arc<dyn ChunkRecognizer>>,
        language: Option<String>,
        cancel: &CancelFlag,
    ) -> Result<(crate::transcript::Transcript, Vec<ChunkFailure>)> {
        let expected = chunks.len();
        let backends: Arc<[Arc<dyn ChunkRecognizer>]> = backends.into();
        let language: Option<Arc<str>> = language.map(Arc::from);
        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let timeout = self.settings.chunk_timeout;

        cancel.check()?;

        // Every chunk task starts now and waits on the pool for its slot.
        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let backends = Arc::clone(&backends);
            let language = language.clone();
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                recognize_chunk(chunk, backends, language, timeout, semaphore, cancel).await
            });
        }

        let mut aggregator = ResultAggregator::new(expected);
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    aggregator.accept(RecognitionResult::final_text(outcome.index, outcome.text));
                    failures.extend(outcome.failures);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Chunk worker ended abnormally");
                }
            }
        }

        failures.sort_by_key(|f| (f.chunk_index, f.backend.priority()));
        Ok((aggregator.finish(), failures))
    }
}

#[async_trait]
impl TranscriptionService for TranscriptionOrchestrator {
    async fn transcribe(
        &self,
        audio: AudioBuffer,
        language_hint: &str,
    ) -> Result<TranscriptionOutput> {
        self.transcribe_with_cancel(audio, language_hint, CancelFlag::new())
            .await
    }
}

/// Try each backend in order until one returns text.
///
/// Every attempt waits for a pool slot first; the timeout starts once the
/// slot is granted.
async fn recognize_chunk(
    chunk: AudioChunk,
    backends: Arc<[Arc<dyn ChunkRecognizer>]>,
    language: Option<Arc<str>>,
    timeout: Duration,
    pool: Arc<Semaphore>,
    cancel: CancelFlag,
) -> ChunkOutcome {
    let index = chunk.index;
    let chunk = Arc::new(chunk);
    let mut failures = Vec::new();

    for backend in backends.iter() {
        if cancel.is_cancelled() {
            break;
        }

        let Some(permit) = acquire_slot(&pool, &cancel).await else {
            break;
        };

        let kind = backend.kind();
        let attempt = cancel.child();
        let started = Instant::now();

        let task = {
            let backend = Arc::clone(backend);
            let chunk = Arc::clone(&chunk);
            let language = language.clone();
            let attempt = attempt.clone();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                backend.recognize(&chunk, language.as_deref(), &attempt)
            })
        };

        let reason = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(text))) => {
                tracing::debug!(
                    chunk = index,
                    backend = %kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Chunk recognized"
                );
                return ChunkOutcome {
                    index,
                    text,
                    failures,
                };
            }
            Ok(Ok(Err(ScribeError::Cancelled))) => break,
            Ok(Ok(Err(e))) => FailureReason::from(e),
            Ok(Err(e)) => FailureReason::Panicked(panic_message(e)),
            Err(_) => {
                // The blocking call keeps running, and keeps its slot, until
                // the engine notices the flag.
                attempt.cancel();
                FailureReason::from(ScribeError::ChunkTimeout {
                    backend: kind,
                    chunk: index,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        let failure = ChunkFailure::new(index, kind, reason);
        failure.report();
        failures.push(failure);
    }

    ChunkOutcome {
        index,
        text: String::new(),
        failures,
    }
}

/// Wait for a pool slot. `None` once the request is cancelled.
async fn acquire_slot(
    pool: &Arc<Semaphore>,
    cancel: &CancelFlag,
) -> Option<OwnedSemaphorePermit> {
    let permit = Arc::clone(pool).acquire_owned().await.ok()?;
    (!cancel.is_cancelled()).then_some(permit)
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
