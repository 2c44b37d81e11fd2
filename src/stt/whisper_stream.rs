//! Frame-driven recognition over a Whisper context.
//!
//! Sessions buffer incoming frames into an utterance window and use frame
//! energy to find its end. A window followed by enough trailing silence is
//! decoded and committed; while speech continues the window is re-decoded
//! every few frames to produce a partial guess.

use crate::audio::level::calculate_rms;
use crate::config::{StreamingSection, WhisperSection};
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::CancelFlag;
use crate::stt::engine::{StreamEvent, StreamingEngine, StreamingSession};
use crate::stt::whisper::{WhisperContext, load_context, resolve_model_path};
use std::sync::Arc;

#[cfg(feature = "whisper")]
use whisper_rs::SamplingStrategy;

/// Window decoder handed to a session.
pub type WindowDecoder = Box<dyn FnMut(&[i16]) -> Result<String> + Send>;

/// Utterance segmentation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtteranceConfig {
    pub silence_threshold: f32,
    /// Trailing silence, in samples, that closes an utterance.
    pub silence_samples: usize,
    pub partial_every_frames: usize,
}

impl From<&StreamingSection> for UtteranceConfig {
    fn from(section: &StreamingSection) -> Self {
        Self {
            silence_threshold: section.silence_threshold,
            silence_samples: section.silence_ms as usize * defaults::SAMPLE_RATE as usize / 1000,
            partial_every_frames: section.partial_every_frames.max(1),
        }
    }
}

#[derive(Debug, PartialEq)]
enum FrameAction {
    /// Utterance closed; decode and commit this window.
    Commit(Vec<i16>),
    /// Re-decode the open window for a partial.
    Partial,
    /// Nothing new to decode.
    Hold,
}

#[derive(Debug)]
struct UtteranceTracker {
    config: UtteranceConfig,
    window: Vec<i16>,
    heard_speech: bool,
    trailing_silence: usize,
    frames_since_partial: usize,
}

impl UtteranceTracker {
    fn new(config: UtteranceConfig) -> Self {
        Self {
            config,
            window: Vec::new(),
            heard_speech: false,
            trailing_silence: 0,
            frames_since_partial: 0,
        }
    }

    fn push(&mut self, frame: &[i16]) -> FrameAction {
        if calculate_rms(frame) >= self.config.silence_threshold {
            self.heard_speech = true;
            self.trailing_silence = 0;
        } else if self.heard_speech {
            self.trailing_silence += frame.len();
        } else {
            // Leading silence never reaches the decoder.
            return FrameAction::Hold;
        }

        self.window.extend_from_slice(frame);

        if self.trailing_silence >= self.config.silence_samples {
            return FrameAction::Commit(self.take());
        }

        self.frames_since_partial += 1;
        if self.frames_since_partial >= self.config.partial_every_frames {
            self.frames_since_partial = 0;
            FrameAction::Partial
        } else {
            FrameAction::Hold
        }
    }

    fn window(&self) -> &[i16] {
        &self.window
    }

    /// Take the open window, leaving the tracker reset.
    fn take(&mut self) -> Vec<i16> {
        self.heard_speech = false;
        self.trailing_silence = 0;
        self.frames_since_partial = 0;
        std::mem::take(&mut self.window)
    }

    fn has_speech(&self) -> bool {
        self.heard_speech
    }
}

/// Streaming session that decodes utterance windows with `decoder`.
pub struct WindowedSession {
    decoder: WindowDecoder,
    tracker: UtteranceTracker,
    last_partial: String,
}

impl WindowedSession {
    pub fn new(config: UtteranceConfig, decoder: WindowDecoder) -> Self {
        Self {
            decoder,
            tracker: UtteranceTracker::new(config),
            last_partial: String::new(),
        }
    }
}

impl StreamingSession for WindowedSession {
    fn accept_frame(&mut self, frame: &[i16]) -> Result<StreamEvent> {
        match self.tracker.push(frame) {
            FrameAction::Commit(window) => {
                self.last_partial.clear();
                let text = (self.decoder)(&window)?;
                Ok(StreamEvent::Accepted(text))
            }
            FrameAction::Partial => {
                let text = (self.decoder)(self.tracker.window())?;
                self.last_partial = text.clone();
                Ok(StreamEvent::Partial(text))
            }
            FrameAction::Hold => Ok(StreamEvent::Partial(self.last_partial.clone())),
        }
    }

    fn finish(&mut self) -> Result<String> {
        self.last_partial.clear();
        if !self.tracker.has_speech() {
            return Ok(String::new());
        }
        let window = self.tracker.take();
        (self.decoder)(&window)
    }
}

/// Streaming-frame engine backed by a (small) Whisper model.
pub struct WhisperStreamEngine {
    context: Arc<WhisperContext>,
    model_name: String,
    utterance: UtteranceConfig,
    threads: Option<usize>,
}

impl std::fmt::Debug for WhisperStreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperStreamEngine")
            .field("model_name", &self.model_name)
            .field("utterance", &self.utterance)
            .field("threads", &self.threads)
            .finish()
    }
}

impl WhisperStreamEngine {
    /// Load `streaming.model` from the Whisper models directory, falling back
    /// to `whisper.fallback_model`.
    pub fn load(whisper: &WhisperSection, streaming: &StreamingSection) -> Result<Self> {
        let mut candidates = vec![streaming.model.clone()];
        if !whisper.fallback_model.is_empty() && whisper.fallback_model != streaming.model {
            candidates.push(whisper.fallback_model.clone());
        }

        let mut last_error = None;
        for model in candidates {
            let path = resolve_model_path(&whisper.models_dir, &model, whisper.effective_compute());
            if !path.exists() {
                last_error = Some(ScribeError::ModelNotFound {
                    path: path.to_string_lossy().to_string(),
                });
                continue;
            }
            match load_context(&path, !whisper.is_cpu()) {
                Ok(context) => {
                    tracing::info!(model = %model, path = %path.display(), "Loaded streaming Whisper model");
                    return Ok(Self {
                        context: Arc::new(context),
                        model_name: model,
                        utterance: UtteranceConfig::from(streaming),
                        threads: whisper.threads,
                    });
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Streaming model failed to load");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ScribeError::EngineInit {
            message: "no streaming model configured".to_string(),
        }))
    }
}

impl StreamingEngine for WhisperStreamEngine {
    #[cfg(feature = "whisper")]
    fn open_session(
        &self,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<Box<dyn StreamingSession>> {
        let context = Arc::clone(&self.context);
        let language = language.map(str::to_string);
        let threads = self.threads;
        let cancel = cancel.clone();

        let decoder: WindowDecoder = Box::new(move |window: &[i16]| {
            if window.is_empty() {
                return Ok(String::new());
            }
            crate::stt::whisper::decode(
                &context,
                window,
                language.as_deref(),
                SamplingStrategy::Greedy { best_of: 1 },
                threads,
                &cancel,
            )
        });

        Ok(Box::new(WindowedSession::new(self.utterance, decoder)))
    }

    #[cfg(not(feature = "whisper"))]
    fn open_session(
        &self,
        _language: Option<&str>,
        _cancel: &CancelFlag,
    ) -> Result<Box<dyn StreamingSession>> {
        match *self.context {}
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
