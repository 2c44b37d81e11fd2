//! Audio buffers, WAV normalization and chunking.

pub mod buffer;
pub mod level;
pub mod segmenter;
pub mod wav;

pub use buffer::{AudioBuffer, AudioFormat};
pub use segmenter::{AudioChunk, segment};
