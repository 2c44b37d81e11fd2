//! Default configuration constants for chunkscribe.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Canonical sample rate in Hz.
///
/// Every recognition adapter consumes mono 16-bit PCM at this rate; the
/// normalizer is the only producer of buffers.
pub const SAMPLE_RATE: u32 = 16000;

/// Canonical channel count (mono).
pub const CHANNELS: u16 = 1;

/// Canonical bit depth.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Nominal chunk duration in milliseconds.
pub const CHUNK_MS: u32 = 8000;

/// Trailing overlap shared between adjacent chunks, in milliseconds.
pub const OVERLAP_MS: u32 = 500;

/// Smallest segmenter advance step in milliseconds.
///
/// Also the smallest chunk duration accepted, otherwise chunks would leave gaps.
pub const MIN_STEP_MS: u32 = 1000;

/// Samples fed to a streaming recognizer per frame (250ms at 16kHz).
pub const STREAMING_FRAME_SAMPLES: usize = 4000;

/// Per-chunk, per-backend timeout in milliseconds.
pub const CHUNK_TIMEOUT_MS: u64 = 60_000;

/// Default transcript language, returned when the caller gives no hint.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default batch (Whisper) model size.
pub const DEFAULT_MODEL: &str = "small";

/// Model tried when the configured batch model cannot be loaded.
pub const FALLBACK_MODEL: &str = "small";

/// Default model for the streaming-frame backend.
///
/// The streaming backend decodes many overlapping windows per chunk, so it
/// uses the smallest model.
pub const DEFAULT_STREAMING_MODEL: &str = "tiny";

/// Default directory holding `ggml-*.bin` model files.
pub const MODELS_DIR: &str = "models";

/// Default inference device hint.
pub const DEFAULT_DEVICE: &str = "cpu";

/// Compute precision used on CPU when none is configured.
pub const CPU_COMPUTE: &str = "int8";

/// Compute precision used on GPU when none is configured.
pub const GPU_COMPUTE: &str = "float16";

/// Beam width for batch decoding.
pub const BEAM_SIZE: u32 = 5;

/// RMS level below which a streaming frame counts as silence.
pub const SILENCE_THRESHOLD: f32 = 0.02;

/// Trailing silence that closes a streaming utterance, in milliseconds.
pub const SILENCE_MS: u32 = 600;

/// Streaming frames between two partial decodes.
pub const PARTIAL_EVERY_FRAMES: usize = 4;

/// Markers Whisper emits for non-speech audio; stripped from recognized text.
pub const NON_SPEECH_MARKERS: &[&str] = &[
    "[BLANK_AUDIO]",
    "[INAUDIBLE]",
    "[MUSIC]",
    "[APPLAUSE]",
    "[LAUGHTER]",
    "(BLANK_AUDIO)",
    "(inaudible)",
];

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

/// Worker pool size when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
