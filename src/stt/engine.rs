use crate::error::Result;
use crate::pipeline::cancel::CancelFlag;
use std::sync::Arc;

/// Whole-utterance speech recognizer.
///
/// Implementations must tolerate concurrent calls from several worker
/// threads; the orchestrator shares one engine across the pool.
pub trait BatchEngine: Send + Sync {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as 16-bit PCM at 16kHz mono
    /// * `language` - Engine language code (`None` = auto-detect)
    /// * `cancel` - Once set, the engine should abandon decoding and return
    ///   `Cancelled` as soon as it can
    fn transcribe(
        &self,
        audio: &[i16],
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

impl<T: BatchEngine + ?Sized> BatchEngine for Arc<T> {
    fn transcribe(
        &self,
        audio: &[i16],
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String> {
        (**self).transcribe(audio, language, cancel)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Outcome of feeding one frame to a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The recognizer committed a fragment. Empty text means it closed an
    /// utterance without new words.
    Accepted(String),
    /// Current best guess for the utterance in progress.
    Partial(String),
}

/// Frame-at-a-time recognizer.
///
/// The engine itself is shared; all mutable decoding state lives in the
/// sessions it opens.
pub trait StreamingEngine: Send + Sync {
    /// Open a session. Decoding inside the session stops early once `cancel`
    /// is set.
    fn open_session(
        &self,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<Box<dyn StreamingSession>>;

    fn model_name(&self) -> &str;
}

impl<T: StreamingEngine + ?Sized> StreamingEngine for Arc<T> {
    fn open_session(
        &self,
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<Box<dyn StreamingSession>> {
        (**self).open_session(language, cancel)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Per-chunk streaming state. Never shared between chunks.
pub trait StreamingSession: Send {
    /// Feed the next frame, in order.
    fn accept_frame(&mut self, frame: &[i16]) -> Result<StreamEvent>;

    /// Flush buffered audio and return the final fragment (may be empty).
    fn finish(&mut self) -> Result<String>;
}
