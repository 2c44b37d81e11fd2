use crate::defaults;
use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure.
///
/// Read once at startup; the orchestrator never rereads it per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub transcription: TranscriptionConfig,
    pub backends: BackendsConfig,
    pub whisper: WhisperSection,
    pub streaming: StreamingSection,
}

/// Request-level transcription settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub language: String,
    pub chunk_ms: u32,
    pub overlap_ms: u32,
    pub chunk_timeout_ms: u64,
    /// Worker pool size (None = available parallelism)
    pub workers: Option<usize>,
}

/// Which backend kinds are enabled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendsConfig {
    /// BatchNeural backend
    pub batch: bool,
    /// StreamingFrame backend
    pub streaming: bool,
}

/// Batch (Whisper) backend tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WhisperSection {
    pub model: String,
    pub fallback_model: String,
    pub models_dir: PathBuf,
    pub device: String,
    /// Compute precision hint (None = int8 on cpu, float16 otherwise)
    pub compute: Option<String>,
    pub beam_size: u32,
    pub threads: Option<usize>,
}

/// Streaming-frame backend tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingSection {
    pub model: String,
    pub frame_samples: usize,
    pub silence_threshold: f32,
    pub silence_ms: u32,
    pub partial_every_frames: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            chunk_ms: defaults::CHUNK_MS,
            overlap_ms: defaults::OVERLAP_MS,
            chunk_timeout_ms: defaults::CHUNK_TIMEOUT_MS,
            workers: None,
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            batch: true,
            streaming: true,
        }
    }
}

impl Default for WhisperSection {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            fallback_model: defaults::FALLBACK_MODEL.to_string(),
            models_dir: PathBuf::from(defaults::MODELS_DIR),
            device: defaults::DEFAULT_DEVICE.to_string(),
            compute: None,
            beam_size: defaults::BEAM_SIZE,
            threads: None,
        }
    }
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_STREAMING_MODEL.to_string(),
            frame_samples: defaults::STREAMING_FRAME_SAMPLES,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_ms: defaults::SILENCE_MS,
            partial_every_frames: defaults::PARTIAL_EVERY_FRAMES,
        }
    }
}

impl WhisperSection {
    /// Whether the device hint asks for CPU-only inference.
    pub fn is_cpu(&self) -> bool {
        self.device.trim().eq_ignore_ascii_case("cpu")
    }

    /// Effective compute precision: the configured hint, or the device default.
    pub fn effective_compute(&self) -> &str {
        match self.compute.as_deref() {
            Some(compute) if !compute.trim().is_empty() => compute.trim(),
            _ if self.is_cpu() => defaults::CPU_COMPUTE,
            _ => defaults::GPU_COMPUTE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML or invalid values.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ScribeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transcription;
        if t.chunk_ms < defaults::MIN_STEP_MS {
            return Err(ScribeError::ConfigInvalidValue {
                key: "transcription.chunk_ms".to_string(),
                message: format!("must be at least {}", defaults::MIN_STEP_MS),
            });
        }
        if t.overlap_ms >= t.chunk_ms {
            return Err(ScribeError::ConfigInvalidValue {
                key: "transcription.overlap_ms".to_string(),
                message: format!("must be smaller than chunk_ms ({})", t.chunk_ms),
            });
        }
        if t.chunk_timeout_ms == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "transcription.chunk_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if t.workers == Some(0) {
            return Err(ScribeError::ConfigInvalidValue {
                key: "transcription.workers".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.streaming.frame_samples == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "streaming.frame_samples".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.streaming.partial_every_frames == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "streaming.partial_every_frames".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Effective worker pool size.
    pub fn workers(&self) -> usize {
        self.transcription
            .workers
            .unwrap_or_else(defaults::default_workers)
            .max(1)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - WHISPER_MODEL → whisper.model
    /// - WHISPER_DEVICE → whisper.device
    /// - WHISPER_COMPUTE → whisper.compute
    /// - CHUNKSCRIBE_MODELS_DIR → whisper.models_dir
    /// - CHUNKSCRIBE_STREAMING_MODEL → streaming.model
    /// - CHUNKSCRIBE_LANGUAGE → transcription.language
    /// - CHUNKSCRIBE_WORKERS → transcription.workers
    /// - CHUNKSCRIBE_BATCH → backends.batch
    /// - CHUNKSCRIBE_STREAMING → backends.streaming
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(model) = env_value("WHISPER_MODEL") {
            self.whisper.model = model;
        }
        if let Some(device) = env_value("WHISPER_DEVICE") {
            self.whisper.device = device;
        }
        if let Some(compute) = env_value("WHISPER_COMPUTE") {
            self.whisper.compute = Some(compute);
        }
        if let Some(dir) = env_value("CHUNKSCRIBE_MODELS_DIR") {
            self.whisper.models_dir = PathBuf::from(dir);
        }
        if let Some(model) = env_value("CHUNKSCRIBE_STREAMING_MODEL") {
            self.streaming.model = model;
        }
        if let Some(language) = env_value("CHUNKSCRIBE_LANGUAGE") {
            self.transcription.language = language;
        }
        if let Some(workers) = env_value("CHUNKSCRIBE_WORKERS").and_then(|w| w.parse().ok())
            && workers > 0
        {
            self.transcription.workers = Some(workers);
        }
        if let Some(enabled) = env_value("CHUNKSCRIBE_BATCH").and_then(|v| parse_bool(&v)) {
            self.backends.batch = enabled;
        }
        if let Some(enabled) = env_value("CHUNKSCRIBE_STREAMING").and_then(|v| parse_bool(&v)) {
            self.backends.streaming = enabled;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/chunkscribe/config.toml on Linux, or None when the
    /// platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chunkscribe").join("config.toml"))
    }

    /// Serialize the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScribeError::ConfigParse {
            message: e.to_string(),
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
