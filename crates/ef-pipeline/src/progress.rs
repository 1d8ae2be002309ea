//! ffmpeg progress parsing and reporting.
//!
//! ffmpeg writes progress as loosely structured `key=value` text, either as
//! `-progress` blocks (one pair per line) or as a single stats line. Every
//! field is matched independently, so a chunk carrying only some fields, or
//! a line split across chunks, never fails; missing fields keep their
//! previous value.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use ef_core::events::{EventPayload, TelemetrySink};
use ef_core::{EncodingProgress, JobId, ProgressId, Result, TaskId};
use ef_db::{ProgressRepository, Store};
use regex::Regex;
use tokio::time::Instant;

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"));
static FPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fps=\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").expect("valid regex"));
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*(\d+(?:\.\d+)?)\s*kbits/s").expect("valid regex"));
// `out_time=` in -progress blocks, `time=` in stats lines. Negative
// timestamps ffmpeg prints before the first packet do not match.
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)(?:out_)?time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid regex")
});
static TIME_US_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"out_time_us=(\d+)").expect("valid regex"));

/// The most recent value of every progress field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub frame: u64,
    pub fps: f64,
    pub speed: f64,
    pub bitrate_kbps: f64,
    pub current_time_secs: f64,
}

impl ProgressSnapshot {
    /// Share of `total_secs` covered so far, clamped to `[0, 100]`.
    pub fn percentage(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.current_time_secs / total_secs * 100.0).clamp(0.0, 100.0)
    }

    /// Seconds left at the current speed; unknown while speed is zero.
    pub fn eta_secs(&self, total_secs: f64) -> Option<f64> {
        if self.speed > 0.0 {
            Some(((total_secs - self.current_time_secs) / self.speed).max(0.0))
        } else {
            None
        }
    }
}

/// Incremental parser that remembers the last value of each field.
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    current: ProgressSnapshot,
}

fn capture<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    // The last occurrence wins when a chunk holds several samples.
    re.captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_clock(text: &str) -> Option<f64> {
    let caps = TIME_RE.captures_iter(text).last()?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk of output into the snapshot.
    pub fn feed(&mut self, chunk: &str) -> ProgressSnapshot {
        let cur = &mut self.current;
        if let Some(frame) = capture(&FRAME_RE, chunk) {
            cur.frame = frame;
        }
        if let Some(fps) = capture(&FPS_RE, chunk) {
            cur.fps = fps;
        }
        if let Some(speed) = capture(&SPEED_RE, chunk) {
            cur.speed = speed;
        }
        if let Some(bitrate) = capture(&BITRATE_RE, chunk) {
            cur.bitrate_kbps = bitrate;
        }
        let time = parse_clock(chunk)
            .or_else(|| capture::<u64>(&TIME_US_RE, chunk).map(|us| us as f64 / 1_000_000.0));
        if let Some(secs) = time {
            cur.current_time_secs = secs;
        }
        *cur
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.current
    }
}

// ---------------------------------------------------------------------------
// ProgressMonitor
// ---------------------------------------------------------------------------

/// Progress reporting for one running task.
///
/// Every chunk becomes an immutable [`EncodingProgress`] row. Telemetry is
/// throttled to one [`EventPayload::TaskProgress`] per `interval`; the throttle
/// timestamp is the monitor's only mutable state besides the parser.
pub struct ProgressMonitor {
    job_id: JobId,
    task_id: TaskId,
    total_secs: f64,
    parser: ProgressParser,
    store: Arc<dyn Store>,
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    last_broadcast: Option<Instant>,
}

impl ProgressMonitor {
    pub fn new(
        job_id: JobId,
        task_id: TaskId,
        total_secs: f64,
        store: Arc<dyn Store>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            job_id,
            task_id,
            total_secs,
            parser: ProgressParser::new(),
            store,
            sink,
            interval: Duration::from_millis(500),
            last_broadcast: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Parse, persist and (maybe) broadcast one chunk.
    pub async fn record(&mut self, chunk: &str) -> Result<EncodingProgress> {
        let snap = self.parser.feed(chunk);
        let sample = EncodingProgress {
            id: ProgressId::new(),
            job_id: self.job_id,
            task_id: self.task_id,
            percentage: snap.percentage(self.total_secs),
            frame: snap.frame,
            fps: snap.fps,
            speed: snap.speed,
            bitrate_kbps: snap.bitrate_kbps,
            current_time_secs: snap.current_time_secs,
            eta_secs: snap.eta_secs(self.total_secs),
            recorded_at: Utc::now(),
        };
        self.store.append_progress(&sample).await?;

        if self.should_broadcast(Instant::now()) {
            self.sink.publish(EventPayload::TaskProgress {
                job_id: sample.job_id,
                task_id: sample.task_id,
                percentage: sample.percentage,
                frame: sample.frame,
                fps: sample.fps,
                speed: sample.speed,
                eta_secs: sample.eta_secs,
            });
        }
        Ok(sample)
    }

    fn should_broadcast(&mut self, now: Instant) -> bool {
        match self.last_broadcast {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_broadcast = Some(now);
                true
            }
        }
    }
}
