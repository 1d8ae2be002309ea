//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a [`JobExecutor`] to an in-memory
//! store, a fixed stream analysis and a scripted process runner, so whole
//! job lifecycles run without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use ef_av::{ProcessOutcome, ProcessRequest, ProcessRunner};
use ef_core::config::ExecutorConfig;
use ef_core::events::{EventPayload, TelemetrySink};
use ef_core::{Error, HdrFormat, Result};
use ef_db::MemoryStore;
use ef_pipeline::JobExecutor;
use ef_probe::{AudioStream, StreamAnalysis, StreamAnalyzer, VideoStream};

/// Source duration used by [`sample_analysis`].
pub const DURATION_SECS: f64 = 600.0;

/// A ten minute 1080p SDR source with one stereo track.
pub fn sample_analysis(path: impl Into<PathBuf>) -> StreamAnalysis {
    let mut analysis = StreamAnalysis::new(path);
    analysis.file_size = 750 * 1024 * 1024;
    analysis.format_name = "matroska,webm".to_string();
    analysis.duration_secs = DURATION_SECS;
    analysis.bit_rate = Some(10_000_000);
    analysis.video_streams.push(VideoStream {
        index: 0,
        codec: "h264".to_string(),
        width: 1920,
        height: 1080,
        frame_rate: Some(23.976),
        bit_depth: Some(8),
        pixel_format: Some("yuv420p".to_string()),
        color_primaries: Some("bt709".to_string()),
        color_transfer: Some("bt709".to_string()),
        color_space: Some("bt709".to_string()),
        hdr_format: HdrFormat::Sdr,
        default: true,
        language: None,
    });
    analysis.audio_streams.push(AudioStream {
        index: 1,
        codec: "aac".to_string(),
        channels: 2,
        sample_rate: Some(48_000),
        bit_rate: Some(192_000),
        language: Some("eng".to_string()),
        default: true,
    });
    analysis
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Analyzer returning [`sample_analysis`] for any existing path.
pub struct FakeAnalyzer;

#[async_trait]
impl StreamAnalyzer for FakeAnalyzer {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn analyze(&self, path: &std::path::Path) -> Result<StreamAnalysis> {
        if !path.exists() {
            return Err(Error::not_found("file", path.display()));
        }
        Ok(sample_analysis(path))
    }
}

/// Process runner following a script keyed by call number.
#[derive(Default)]
pub struct ScriptedRunner {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ProcessRequest>>,
    /// Progress chunks sent on every call.
    pub progress: Vec<String>,
    /// Exit non-zero on this call.
    pub fail_at: Option<usize>,
    /// Panic on this call.
    pub panic_at: Option<usize>,
    /// Block on this call until the token is cancelled.
    pub hang_at: Option<usize>,
    /// Hold this call open until `release` is notified.
    pub hold_at: Option<usize>,
    /// Notified whenever a call starts.
    pub started: Notify,
    pub release: Notify,
}

impl ScriptedRunner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.command.clone()).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        request: ProcessRequest,
        progress: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        self.started.notify_one();

        if self.panic_at == Some(call) {
            panic!("scripted panic on call {call}");
        }
        for chunk in &self.progress {
            let _ = progress.send(chunk.clone());
        }
        if self.hang_at == Some(call) {
            cancel.cancelled().await;
            return Err(Error::Cancelled);
        }
        if self.hold_at == Some(call) {
            self.release.notified().await;
        }

        if self.fail_at == Some(call) {
            Ok(ProcessOutcome {
                exit_code: 1,
                stderr: "Conversion failed!".to_string(),
            })
        } else {
            Ok(ProcessOutcome {
                exit_code: 0,
                stderr: String::new(),
            })
        }
    }
}

/// Sink keeping every published payload.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EventPayload>>,
}

impl TelemetrySink for RecordingSink {
    fn publish(&self, payload: EventPayload) {
        self.events.lock().push(payload);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An executor over an in-memory store with a real input file on disk.
pub struct TestHarness {
    pub executor: JobExecutor,
    pub store: Arc<MemoryStore>,
    pub runner: Arc<ScriptedRunner>,
    pub sink: Arc<RecordingSink>,
    pub input: PathBuf,
    pub output: PathBuf,
    _dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_runner(ScriptedRunner::default())
    }

    pub fn with_runner(runner: ScriptedRunner) -> Self {
        Self::with_config(runner, ExecutorConfig::default())
    }

    pub fn with_config(runner: ScriptedRunner, config: ExecutorConfig) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"not really matroska").expect("failed to write input");
        let output = dir.path().join("out");

        let store = Arc::new(MemoryStore::new());
        let runner = Arc::new(runner);
        let sink = Arc::new(RecordingSink::default());
        let executor = JobExecutor::new(store.clone(), Arc::new(FakeAnalyzer), runner.clone())
            .with_config(config)
            .with_sink(sink.clone());

        Self {
            executor,
            store,
            runner,
            sink,
            input,
            output,
            _dir: dir,
        }
    }

    pub fn events(&self) -> Vec<EventPayload> {
        self.sink.events.lock().clone()
    }
}
