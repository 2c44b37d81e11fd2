//! End-to-end orchestration with scripted engines: ordering, fallback,
//! availability, timeouts and cancellation.

use chunkscribe::audio::AudioBuffer;
use chunkscribe::pipeline::{
    CancelFlag, FailureReason, OrchestratorSettings, TranscriptionOrchestrator,
    TranscriptionService,
};
use chunkscribe::stt::mock::{MockBatchEngine, MockStreamingEngine};
use chunkscribe::stt::{
    BackendKind, BackendRegistry, BatchEngine, BatchRecognizer, LazyEngine, StreamEvent,
    StreamingRecognizer,
};
use chunkscribe::{Result, ScribeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const SAMPLE_RATE: usize = 16000;

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        chunk_ms: 8000,
        overlap_ms: 500,
        chunk_timeout: Duration::from_secs(10),
        workers: 4,
        default_language: "pt-BR".to_string(),
    }
}

fn silence(secs: usize) -> AudioBuffer {
    AudioBuffer::normalized(vec![0i16; secs * SAMPLE_RATE])
}

/// Every sample carries the index of the second it belongs to.
fn numbered_seconds(secs: usize) -> AudioBuffer {
    let samples = (0..secs * SAMPLE_RATE)
        .map(|i| (i / SAMPLE_RATE) as i16)
        .collect();
    AudioBuffer::normalized(samples)
}

fn batch(engine: &MockBatchEngine) -> Arc<BatchRecognizer> {
    Arc::new(BatchRecognizer::from_engine(Arc::new(engine.clone())))
}

fn streaming(engine: &MockStreamingEngine) -> Arc<StreamingRecognizer> {
    Arc::new(StreamingRecognizer::from_engine(
        Arc::new(engine.clone()),
        4000,
    ))
}

fn accepting(text: &str) -> MockStreamingEngine {
    MockStreamingEngine::new("stream").with_events(vec![StreamEvent::Accepted(text.to_string())])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn output_follows_chunk_order_under_skewed_latency() {
    // Earlier chunks answer last.
    let engine = MockBatchEngine::new("batch").with_responder(Arc::new(|audio: &[i16]| {
        let second = audio.first().copied().unwrap_or(-1);
        let delay = 40u64.saturating_sub(second.max(0) as u64) * 5;
        std::thread::sleep(Duration::from_millis(delay));
        Ok(format!("w{}", second))
    }));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(batch(&engine)),
        OrchestratorSettings {
            workers: 6,
            ..settings()
        },
    );

    let output = orchestrator
        .transcribe(numbered_seconds(40), "")
        .await
        .unwrap();

    assert_eq!(output.chunk_count, 6);
    assert_eq!(output.text, "w0 w7 w15 w22 w30 w37");
    assert!(output.failures.is_empty());
    assert_eq!(engine.call_count(), 6);
}

#[tokio::test]
async fn single_worker_gives_the_same_text() {
    let engine = MockBatchEngine::new("batch").with_responder(Arc::new(|audio: &[i16]| {
        Ok(format!("w{}", audio.first().copied().unwrap_or(-1)))
    }));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(batch(&engine)),
        OrchestratorSettings {
            workers: 1,
            ..settings()
        },
    );

    let output = orchestrator
        .transcribe(numbered_seconds(40), "")
        .await
        .unwrap();

    assert_eq!(output.text, "w0 w7 w15 w22 w30 w37");
}

#[tokio::test]
async fn disabled_batch_backend_is_never_called() {
    let batch_engine = MockBatchEngine::new("batch").with_response("from batch");
    let stream_engine = accepting("from streaming");
    let registry = BackendRegistry::new()
        .with_disabled(batch(&batch_engine))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator.transcribe(silence(3), "").await.unwrap();

    assert_eq!(output.text, "from streaming");
    assert_eq!(batch_engine.call_count(), 0);
    assert_eq!(stream_engine.session_count(), 1);
    assert!(output.failures.is_empty());
}

#[tokio::test]
async fn no_enabled_backend_is_unavailable() {
    let registry = BackendRegistry::new()
        .with_disabled(batch(&MockBatchEngine::new("batch")))
        .with_disabled(streaming(&accepting("unused")));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let result = orchestrator.transcribe(silence(3), "").await;

    assert!(matches!(
        result,
        Err(ScribeError::BackendUnavailable { .. })
    ));
}

#[tokio::test]
async fn engine_load_failure_makes_backend_unavailable() {
    let broken: Arc<LazyEngine<dyn BatchEngine>> = Arc::new(LazyEngine::new("broken", || {
        Err(ScribeError::EngineInit {
            message: "weights corrupted".to_string(),
        })
    }));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(Arc::new(BatchRecognizer::new(broken))),
        settings(),
    );

    match orchestrator.transcribe(silence(3), "").await {
        Err(ScribeError::BackendUnavailable { message }) => {
            assert!(message.contains("weights corrupted"), "got: {}", message);
        }
        other => panic!("Expected BackendUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn engine_load_failure_leaves_other_backends_running() {
    let broken: Arc<LazyEngine<dyn BatchEngine>> = Arc::new(LazyEngine::new("broken", || {
        Err(ScribeError::EngineInit {
            message: "weights corrupted".to_string(),
        })
    }));
    let stream_engine = accepting("still works");
    let registry = BackendRegistry::new()
        .with(Arc::new(BatchRecognizer::new(broken)))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator.transcribe(silence(3), "").await.unwrap();

    assert_eq!(output.text, "still works");
    // The backend never came up, so no chunk attempt was recorded against it.
    assert!(output.failures.is_empty());
}

#[tokio::test]
async fn reversed_registration_still_prefers_batch() {
    let batch_engine = MockBatchEngine::new("batch").with_response("batch text");
    let stream_engine = accepting("stream text");
    let registry = BackendRegistry::new()
        .with(streaming(&stream_engine))
        .with(batch(&batch_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator.transcribe(silence(3), "").await.unwrap();

    assert_eq!(output.text, "batch text");
    assert_eq!(stream_engine.session_count(), 0);
    let kinds: Vec<BackendKind> = orchestrator
        .registry()
        .descriptors()
        .into_iter()
        .map(|d| d.kind)
        .collect();
    assert_eq!(kinds, vec![BackendKind::BatchNeural, BackendKind::StreamingFrame]);
}

#[tokio::test]
async fn failing_chunks_fall_back_per_chunk() {
    // Batch fails only on the second chunk.
    let batch_engine = MockBatchEngine::new("batch").with_responder(Arc::new(|audio: &[i16]| {
        match audio.first().copied() {
            Some(7) => Err(ScribeError::Inference {
                message: "decoder diverged".to_string(),
            }),
            first => Ok(format!("b{}", first.unwrap_or(-1))),
        }
    }));
    let stream_engine = accepting("rescued");
    let registry = BackendRegistry::new()
        .with(batch(&batch_engine))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator
        .transcribe(numbered_seconds(20), "")
        .await
        .unwrap();

    assert_eq!(output.text, "b0 rescued b15");
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].chunk_index, 1);
    assert_eq!(output.failures[0].backend, BackendKind::BatchNeural);
    assert!(matches!(output.failures[0].reason, FailureReason::Failed(_)));
    assert_eq!(stream_engine.session_count(), 1);
}

#[tokio::test]
async fn chunk_nobody_can_handle_contributes_nothing() {
    let batch_engine = MockBatchEngine::new("batch").with_responder(Arc::new(|audio: &[i16]| {
        match audio.first().copied() {
            Some(7) => Err(ScribeError::Inference {
                message: "decoder diverged".to_string(),
            }),
            first => Ok(format!("b{}", first.unwrap_or(-1))),
        }
    }));
    let stream_engine = MockStreamingEngine::new("stream").with_failure();
    let registry = BackendRegistry::new()
        .with(batch(&batch_engine))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator
        .transcribe(numbered_seconds(20), "")
        .await
        .unwrap();

    assert_eq!(output.text, "b0 b15");
    let failed: Vec<(usize, BackendKind)> = output
        .failures
        .iter()
        .map(|f| (f.chunk_index, f.backend))
        .collect();
    assert_eq!(
        failed,
        vec![(1, BackendKind::BatchNeural), (1, BackendKind::StreamingFrame)]
    );
}

#[tokio::test]
async fn slow_batch_times_out_and_falls_back() {
    let batch_engine = MockBatchEngine::new("batch")
        .with_response("too late")
        .with_delay(Duration::from_millis(800));
    let stream_engine = accepting("in time");
    let registry = BackendRegistry::new()
        .with(batch(&batch_engine))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(
        registry,
        OrchestratorSettings {
            chunk_timeout: Duration::from_millis(100),
            ..settings()
        },
    );

    let output = orchestrator.transcribe(silence(2), "").await.unwrap();

    assert_eq!(output.text, "in time");
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].reason, FailureReason::TimedOut);
}

/// Batch engine that ignores cancellation and tracks overlapping calls.
#[derive(Debug, Default)]
struct StubbornEngine {
    sleep: Duration,
    live: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl BatchEngine for StubbornEngine {
    fn transcribe(
        &self,
        _audio: &[i16],
        _language: Option<&str>,
        _cancel: &CancelFlag,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        std::thread::sleep(self.sleep);
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok("late".to_string())
    }

    fn model_name(&self) -> &str {
        "stubborn"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timed_out_calls_keep_their_pool_slot() {
    let engine = Arc::new(StubbornEngine {
        sleep: Duration::from_millis(200),
        ..StubbornEngine::default()
    });
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(Arc::new(BatchRecognizer::from_engine(
            Arc::clone(&engine) as Arc<dyn BatchEngine>,
        ))),
        OrchestratorSettings {
            workers: 2,
            chunk_timeout: Duration::from_millis(30),
            ..settings()
        },
    );

    // 30s at 8s chunks with 0.5s overlap: 4 chunks.
    let output = orchestrator.transcribe(silence(30), "").await.unwrap();

    assert_eq!(output.chunk_count, 4);
    assert_eq!(output.text, "");
    assert_eq!(output.failures.len(), 4);
    assert!(
        output
            .failures
            .iter()
            .all(|f| f.reason == FailureReason::TimedOut)
    );
    assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
    assert!(
        engine.peak.load(Ordering::SeqCst) <= 2,
        "{} engine calls overlapped with 2 workers",
        engine.peak.load(Ordering::SeqCst)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_stops_engines_that_honor_cancellation() {
    let engine = MockBatchEngine::new("batch").with_delay(Duration::from_secs(30));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(batch(&engine)),
        OrchestratorSettings {
            workers: 1,
            chunk_timeout: Duration::from_millis(50),
            ..settings()
        },
    );

    let started = Instant::now();
    let output = orchestrator.transcribe(silence(30), "").await.unwrap();

    // One worker, four chunks: only possible if each call gave up its slot.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(engine.call_count(), 4);
    assert_eq!(output.failures.len(), 4);
}

#[tokio::test]
async fn panicking_backend_is_recorded_and_skipped() {
    let batch_engine = MockBatchEngine::new("batch").with_responder(Arc::new(
        |_audio: &[i16]| -> Result<String> { panic!("engine blew up") },
    ));
    let stream_engine = accepting("survivor");
    let registry = BackendRegistry::new()
        .with(batch(&batch_engine))
        .with(streaming(&stream_engine));
    let orchestrator = TranscriptionOrchestrator::new(registry, settings());

    let output = orchestrator.transcribe(silence(2), "").await.unwrap();

    assert_eq!(output.text, "survivor");
    assert_eq!(
        output.failures[0].reason,
        FailureReason::Panicked("engine blew up".to_string())
    );
}

#[tokio::test]
async fn cancelling_stops_streaming_workers() {
    let stream_engine =
        MockStreamingEngine::new("stream").with_frame_delay(Duration::from_millis(50));
    let orchestrator = Arc::new(TranscriptionOrchestrator::new(
        BackendRegistry::new().with(streaming(&stream_engine)),
        settings(),
    ));
    let cancel = CancelFlag::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            cancel.cancel();
        })
    };

    // 20s of audio: 84 frames across 3 chunks if nothing stops them.
    let result = orchestrator
        .transcribe_with_cancel(silence(20), "", cancel)
        .await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(ScribeError::Cancelled)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = stream_engine.frame_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stream_engine.frame_count(), settled);
    assert!(settled < 30, "workers kept feeding frames: {}", settled);
}

#[tokio::test]
async fn dropping_the_request_cancels_in_flight_chunks() {
    let stream_engine =
        MockStreamingEngine::new("stream").with_frame_delay(Duration::from_millis(50));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(streaming(&stream_engine)),
        settings(),
    );

    let abandoned =
        tokio::time::timeout(Duration::from_millis(150), orchestrator.transcribe(silence(20), ""))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = stream_engine.frame_count();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stream_engine.frame_count(), settled);
    assert!(settled < 30, "workers kept feeding frames: {}", settled);
}

#[tokio::test]
async fn language_is_hint_or_configured_default() {
    let engine = MockBatchEngine::new("batch").with_response("texto");
    let orchestrator =
        TranscriptionOrchestrator::new(BackendRegistry::new().with(batch(&engine)), settings());

    let defaulted = orchestrator.transcribe(silence(1), "").await.unwrap();
    assert_eq!(defaulted.language, "pt-BR");

    let auto = orchestrator.transcribe(silence(1), "auto").await.unwrap();
    assert_eq!(auto.language, "pt-BR");

    let hinted = orchestrator.transcribe(silence(1), "en-US").await.unwrap();
    assert_eq!(hinted.language, "en-US");

    assert_eq!(
        engine.languages(),
        vec![
            Some("pt".to_string()),
            Some("pt".to_string()),
            Some("en".to_string())
        ]
    );
}

#[tokio::test]
async fn empty_audio_yields_empty_text() {
    let engine = MockBatchEngine::new("batch");
    let orchestrator =
        TranscriptionOrchestrator::new(BackendRegistry::new().with(batch(&engine)), settings());

    let output = orchestrator
        .transcribe(AudioBuffer::normalized(Vec::new()), "")
        .await
        .unwrap();

    assert_eq!(output.text, "");
    assert_eq!(output.chunk_count, 1);
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn overlap_repeats_are_collapsed_across_chunks() {
    // Each chunk hears the tail of the previous one again.
    let engine = MockBatchEngine::new("batch").with_responder(Arc::new(|audio: &[i16]| {
        Ok(match audio.first().copied() {
            Some(0) => "the quick brown fox".to_string(),
            _ => "brown fox jumps over".to_string(),
        })
    }));
    let orchestrator = TranscriptionOrchestrator::new(
        BackendRegistry::new().with(batch(&engine)),
        settings(),
    );

    let output = orchestrator
        .transcribe(numbered_seconds(12), "")
        .await
        .unwrap();

    assert_eq!(output.chunk_count, 2);
    assert_eq!(output.text, "the quick brown fox jumps over");
}

#[tokio::test]
async fn works_through_the_service_trait() {
    let engine = MockBatchEngine::new("batch").with_response("via trait");
    let service: Arc<dyn TranscriptionService> = Arc::new(TranscriptionOrchestrator::new(
        BackendRegistry::new().with(batch(&engine)),
        settings(),
    ));

    let output = service.transcribe(silence(1), "es").await.unwrap();

    assert_eq!(output.text, "via trait");
    assert_eq!(output.language, "es");
}
