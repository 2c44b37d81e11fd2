//! Whisper-based batch recognition.
//!
//! This module provides a Whisper implementation of the BatchEngine trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without the feature the engine is a stub whose loader always fails, which
//! leaves the batch backend unavailable.

use crate::config::WhisperSection;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::CancelFlag;
use crate::stt::engine::BatchEngine;
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
pub(crate) use whisper_rs::WhisperContext;
#[cfg(feature = "whisper")]
use whisper_rs::{FullParams, SamplingStrategy, WhisperContextParameters, install_logging_hooks};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Locate the model file for `model` inside `models_dir`.
///
/// With an `int8` compute hint the quantized `ggml-{model}-q8_0.bin` is
/// preferred when present; otherwise `ggml-{model}.bin`.
pub fn resolve_model_path(models_dir: &Path, model: &str, compute: &str) -> PathBuf {
    if compute.eq_ignore_ascii_case("int8") {
        let quantized = models_dir.join(format!("ggml-{model}-q8_0.bin"));
        if quantized.exists() {
            return quantized;
        }
    }
    models_dir.join(format!("ggml-{model}.bin"))
}

/// Models to try in order: the configured one, then the fallback.
pub fn model_candidates(section: &WhisperSection) -> Vec<String> {
    let mut candidates = vec![section.model.clone()];
    if !section.fallback_model.is_empty() && section.fallback_model != section.model {
        candidates.push(section.fallback_model.clone());
    }
    candidates
}

/// Remove Whisper's non-speech markers and collapse the leftover whitespace.
pub fn clean_transcription(text: &str) -> String {
    let mut cleaned = text.to_string();
    for marker in defaults::NON_SPEECH_MARKERS {
        cleaned = cleaned.replace(marker, " ");
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Without the `whisper` feature no context can ever exist.
#[cfg(not(feature = "whisper"))]
pub(crate) type WhisperContext = std::convert::Infallible;

/// Whisper-based batch engine.
///
/// One `WhisperContext` is shared by every caller; each `transcribe` call
/// creates its own decoding state, so concurrent calls from the worker pool
/// do not contend on a lock.
///
/// # Feature Gate
///
/// This type can only be constructed when the `whisper` feature is enabled.
pub struct WhisperEngine {
    context: WhisperContext,
    model_name: String,
    model_path: PathBuf,
    beam_size: u32,
    threads: Option<usize>,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("model_name", &self.model_name)
            .field("model_path", &self.model_path)
            .field("beam_size", &self.beam_size)
            .field("threads", &self.threads)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

impl WhisperEngine {
    /// Load the configured model, falling back to `fallback_model`.
    ///
    /// # Errors
    /// Returns `ModelNotFound` when no candidate model file exists and
    /// `EngineInit` when every existing candidate fails to load.
    pub fn load(section: &WhisperSection) -> Result<Self> {
        let mut last_error = None;

        for model in model_candidates(section) {
            let path = resolve_model_path(
                &section.models_dir,
                &model,
                section.effective_compute(),
            );
            match Self::load_model(section, &model, &path) {
                Ok(engine) => return Ok(engine),
                Err(e) => {
                    tracing::warn!(model = %model, path = %path.display(), error = %e, "Whisper model unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ScribeError::EngineInit {
            message: "no Whisper model configured".to_string(),
        }))
    }

    fn load_model(section: &WhisperSection, model: &str, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScribeError::ModelNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let context = load_context(path, !section.is_cpu())?;

        tracing::info!(
            model = %model,
            path = %path.display(),
            device = %section.device,
            compute = %section.effective_compute(),
            gpu = defaults::gpu_backend(),
            "Loaded Whisper model"
        );

        Ok(Self {
            context,
            model_name: model.to_string(),
            model_path: path.to_path_buf(),
            beam_size: section.beam_size.max(1),
            threads: section.threads,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Open a Whisper context for `path`. Installs the tracing log hooks once.
#[cfg(feature = "whisper")]
pub(crate) fn load_context(path: &Path, use_gpu: bool) -> Result<WhisperContext> {
    LOGGING_HOOKS_INSTALLED.call_once(|| {
        install_logging_hooks();
    });

    let mut context_params = WhisperContextParameters::default();
    context_params.use_gpu(use_gpu);
    context_params.flash_attn(use_gpu);

    let path_str = path.to_str().ok_or_else(|| ScribeError::EngineInit {
        message: format!("Invalid UTF-8 in model path {}", path.display()),
    })?;

    WhisperContext::new_with_params(path_str, context_params).map_err(|e| ScribeError::EngineInit {
        message: format!("Failed to load Whisper model {}: {}", path.display(), e),
    })
}

#[cfg(not(feature = "whisper"))]
pub(crate) fn load_context(path: &Path, _use_gpu: bool) -> Result<WhisperContext> {
    Err(ScribeError::EngineInit {
        message: format!(
            "cannot load {}: whisper feature not enabled. This binary was built without speech recognition.\n\
             To fix: cargo build --release --features whisper\n\
             If build fails with cmake errors, install: sudo apt install cmake",
            path.display()
        ),
    })
}

/// Decode one window with a fresh state on `context`.
///
/// Whisper polls `cancel` between encoder and decoder steps and aborts the
/// run once it is set; the call then returns `Cancelled`.
#[cfg(feature = "whisper")]
pub(crate) fn decode(
    context: &WhisperContext,
    audio: &[i16],
    language: Option<&str>,
    strategy: SamplingStrategy,
    threads: Option<usize>,
    cancel: &CancelFlag,
) -> Result<String> {
    cancel.check()?;

    let audio_f32 = crate::audio::level::to_f32(audio);

    let mut state = context
        .create_state()
        .map_err(|e| ScribeError::Inference {
            message: format!("Failed to create Whisper state: {}", e),
        })?;

    let mut params = FullParams::new(strategy);
    params.set_language(language);
    if let Some(threads) = threads {
        params.set_n_threads(threads as i32);
    }
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let abort = cancel.clone();
    params.set_abort_callback_safe(move || abort.is_cancelled());

    if let Err(e) = state.full(params, &audio_f32) {
        if cancel.is_cancelled() {
            return Err(ScribeError::Cancelled);
        }
        return Err(ScribeError::Inference {
            message: format!("Whisper inference failed: {}", e),
        });
    }
    cancel.check()?;

    let mut transcription = String::new();
    for segment in state.as_iter() {
        transcription.push_str(&segment.to_string());
        transcription.push(' ');
    }

    Ok(clean_transcription(&transcription))
}

impl BatchEngine for WhisperEngine {
    #[cfg(feature = "whisper")]
    fn transcribe(
        &self,
        audio: &[i16],
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        let strategy = SamplingStrategy::BeamSearch {
            beam_size: self.beam_size as i32,
            patience: -1.0,
        };
        decode(&self.context, audio, language, strategy, self.threads, cancel)
    }

    #[cfg(not(feature = "whisper"))]
    fn transcribe(
        &self,
        _audio: &[i16],
        _language: Option<&str>,
        _cancel: &CancelFlag,
    ) -> Result<String> {
        match self.context {}
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_prefers_quantized_model_for_int8() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ggml-small-q8_0.bin"), b"q").unwrap();
        std::fs::write(dir.path().join("ggml-small.bin"), b"f").unwrap();

        assert_eq!(
            resolve_model_path(dir.path(), "small", "int8"),
            dir.path().join("ggml-small-q8_0.bin")
        );
        assert_eq!(
            resolve_model_path(dir.path(), "small", "float16"),
            dir.path().join("ggml-small.bin")
        );
    }

    #[test]
    fn resolve_falls_back_to_full_precision_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_model_path(dir.path(), "medium", "int8"),
            dir.path().join("ggml-medium.bin")
        );
    }

    #[test]
    fn candidates_include_distinct_fallback() {
        let mut section = WhisperSection {
            model: "large-v3".to_string(),
            ..WhisperSection::default()
        };
        assert_eq!(model_candidates(&section), vec!["large-v3", "small"]);

        section.model = "small".to_string();
        assert_eq!(model_candidates(&section), vec!["small"]);
    }

    #[test]
    fn clean_transcription_strips_markers() {
        assert_eq!(clean_transcription(" [BLANK_AUDIO] "), "");
        assert_eq!(
            clean_transcription("olá [MUSIC]  mundo (inaudible)"),
            "olá mundo"
        );
        assert_eq!(clean_transcription("plain text"), "plain text");
    }

    #[test]
    fn load_reports_missing_model() {
        let dir = TempDir::new().unwrap();
        let section = WhisperSection {
            models_dir: dir.path().to_path_buf(),
            ..WhisperSection::default()
        };

        match WhisperEngine::load(&section) {
            Err(ScribeError::ModelNotFound { path }) => {
                assert!(path.ends_with("ggml-small.bin"));
            }
            other => panic!("Expected ModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn load_rejects_invalid_model_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ggml-small.bin"), b"fake model data").unwrap();
        let section = WhisperSection {
            models_dir: dir.path().to_path_buf(),
            compute: Some("float16".to_string()),
            ..WhisperSection::default()
        };

        // Stub: feature disabled. Real engine: not a valid ggml file.
        assert!(matches!(
            WhisperEngine::load(&section),
            Err(ScribeError::EngineInit { .. })
        ));
    }
}
