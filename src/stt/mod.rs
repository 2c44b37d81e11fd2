//! Speech recognition: engines, lazy loading, and the chunk adapters.

pub mod backend;
pub mod batch;
pub mod engine;
pub mod lazy;
pub mod mock;
pub mod streaming;
pub mod whisper;
pub mod whisper_stream;

pub use backend::{BackendDescriptor, BackendKind, BackendRegistry, ChunkRecognizer};
pub use batch::BatchRecognizer;
pub use engine::{BatchEngine, StreamEvent, StreamingEngine, StreamingSession};
pub use lazy::LazyEngine;
pub use streaming::StreamingRecognizer;
