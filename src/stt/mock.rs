//! Scriptable engines for tests.
//!
//! Both mocks share their counters across clones, so a test can keep one
//! handle and hand another to the registry.

use crate::error::{Result, ScribeError};
use crate::pipeline::cancel::CancelFlag;
use crate::stt::engine::{BatchEngine, StreamEvent, StreamingEngine, StreamingSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Computes a response from the audio handed to the engine.
pub type Responder = Arc<dyn Fn(&[i16]) -> Result<String> + Send + Sync>;

/// Mock batch engine for testing
#[derive(Clone)]
pub struct MockBatchEngine {
    model_name: String,
    response: String,
    responder: Option<Responder>,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    languages: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockBatchEngine {
    /// Create a new mock engine with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            responder: None,
            should_fail: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            languages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Compute the response from the audio instead of returning a fixed one
    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Block for `delay` before answering. Cancelling the call cuts the
    /// wait short with `Cancelled`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcribe calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Language codes received, in call order
    pub fn languages(&self) -> Vec<Option<String>> {
        self.languages
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl std::fmt::Debug for MockBatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBatchEngine")
            .field("model_name", &self.model_name)
            .field("should_fail", &self.should_fail)
            .field("delay", &self.delay)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl BatchEngine for MockBatchEngine {
    fn transcribe(
        &self,
        audio: &[i16],
        language: Option<&str>,
        cancel: &CancelFlag,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut languages) = self.languages.lock() {
            languages.push(language.map(str::to_string));
        }

        if let Some(delay) = self.delay {
            sleep_unless_cancelled(delay, cancel)?;
        }

        if self.should_fail {
            return Err(ScribeError::Inference {
                message: "mock transcription failure".to_string(),
            });
        }

        match &self.responder {
            Some(responder) => responder(audio),
            None => Ok(self.response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Sleep in short steps, bailing out once `cancel` is set.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancelFlag) -> Result<()> {
    const STEP: Duration = Duration::from_millis(5);

    let deadline = std::time::Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return Err(ScribeError::Cancelled);
        }
        let now = std::time::Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(STEP.min(deadline - now));
    }
}

/// Mock streaming engine replaying a fixed event script per session.
///
/// Frame `i` of every session yields `events[i]`; frames past the end of the
/// script yield an empty partial.
#[derive(Debug, Clone)]
pub struct MockStreamingEngine {
    model_name: String,
    events: Vec<StreamEvent>,
    final_text: String,
    should_fail: bool,
    frame_delay: Option<Duration>,
    sessions: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
}

impl MockStreamingEngine {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            events: Vec::new(),
            final_text: String::new(),
            should_fail: false,
            frame_delay: None,
            sessions: Arc::new(AtomicUsize::new(0)),
            frames: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_events(mut self, events: Vec<StreamEvent>) -> Self {
        self.events = events;
        self
    }

    /// Text returned by `finish()`
    pub fn with_final_text(mut self, text: &str) -> Self {
        self.final_text = text.to_string();
        self
    }

    /// Make `open_session` fail
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Block for `delay` on every frame
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Sessions opened so far
    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Frames fed across all sessions
    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl StreamingEngine for MockStreamingEngine {
    fn open_session(
        &self,
        _language: Option<&str>,
        _cancel: &CancelFlag,
    ) -> Result<Box<dyn StreamingSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ScribeError::Inference {
                message: "mock streaming failure".to_string(),
            });
        }
        Ok(Box::new(MockSession {
            events: self.events.clone(),
            final_text: self.final_text.clone(),
            frame_delay: self.frame_delay,
            position: 0,
            frames: Arc::clone(&self.frames),
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

struct MockSession {
    events: Vec<StreamEvent>,
    final_text: String,
    frame_delay: Option<Duration>,
    position: usize,
    frames: Arc<AtomicUsize>,
}

impl StreamingSession for MockSession {
    fn accept_frame(&mut self, _frame: &[i16]) -> Result<StreamEvent> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }

        let event = self
            .events
            .get(self.position)
            .cloned()
            .unwrap_or_else(|| StreamEvent::Partial(String::new()));
        self.position += 1;
        Ok(event)
    }

    fn finish(&mut self) -> Result<String> {
        Ok(std::mem::take(&mut self.final_text))
    }
}
