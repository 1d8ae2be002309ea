//! Encoding job, task and progress entities plus their state machines.
//!
//! Jobs move `queued → processing → {completed | failed | cancelled}` and
//! tasks move `pending → processing → {completed | failed | cancelled}`.
//! Terminal states are final. Every persisted mutation goes through
//! [`EncodingJob::apply`] / [`EncodingTask::apply`] so that both storage
//! backends enforce the same transition table and timestamp rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ids::{JobId, ProfileId, ProgressId, TaskId};
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of an [`EncodingJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job may be cancelled from this state.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Queued, Failed)
                | (Queued, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Validation(format!("unknown job state '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

/// Lifecycle state of an [`EncodingTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Validation(format!("unknown task state '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// What a task does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// One external-process invocation producing every rendition.
    Transcode,
    /// Thumbnail extraction from the transcoded output.
    Thumbnails,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcode => "transcode",
            Self::Thumbnails => "thumbnails",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transcode" => Ok(Self::Transcode),
            "thumbnails" => Ok(Self::Thumbnails),
            other => Err(Error::Validation(format!("unknown task type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// EncodingJob
// ---------------------------------------------------------------------------

/// One end-to-end request to transcode a source file per a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingJob {
    pub id: JobId,
    pub input_path: PathBuf,
    pub output_folder: PathBuf,
    pub profile_id: ProfileId,
    /// JSON snapshot of the profile taken at creation time. Later edits to
    /// the stored profile never affect this job.
    pub profile_snapshot: String,
    pub state: JobState,
    /// Sum of the weights of this job's tasks.
    pub weight: f64,
    pub error_message: Option<String>,
    /// Task whose failure failed the job.
    pub failed_task_id: Option<TaskId>,
    /// Job this one retries, if it was created by the retry policy.
    pub retry_of: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
}

impl EncodingJob {
    /// A fresh `queued` job.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
        profile_id: ProfileId,
        profile_snapshot: String,
    ) -> Self {
        Self {
            id: JobId::new(),
            input_path: input_path.into(),
            output_folder: output_folder.into(),
            profile_id,
            profile_snapshot,
            state: JobState::Queued,
            weight: 0.0,
            error_message: None,
            failed_task_id: None,
            retry_of: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
        }
    }

    /// Apply a state transition, stamping `started_at` on entry to
    /// `processing` and `completed_at`/`execution_time_ms` on entry to a
    /// terminal state.
    pub fn apply(&mut self, transition: &JobTransition, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(transition.to) {
            return Err(Error::InvalidState(format!(
                "job {}: {} -> {}",
                self.id, self.state, transition.to
            )));
        }

        self.state = transition.to;
        if transition.to == JobState::Processing {
            self.started_at = Some(now);
        }
        if transition.to.is_terminal() {
            self.completed_at = Some(now);
            if let Some(started) = self.started_at {
                self.execution_time_ms = Some((now - started).num_milliseconds().max(0));
            }
        }
        if let Some(ref message) = transition.error_message {
            self.error_message = Some(message.clone());
        }
        if let Some(task_id) = transition.failed_task_id {
            self.failed_task_id = Some(task_id);
        }
        Ok(())
    }
}

/// A requested job state change.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub to: JobState,
    pub error_message: Option<String>,
    pub failed_task_id: Option<TaskId>,
}

impl JobTransition {
    pub fn to(state: JobState) -> Self {
        Self {
            to: state,
            error_message: None,
            failed_task_id: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_failed_task(mut self, task_id: TaskId) -> Self {
        self.failed_task_id = Some(task_id);
        self
    }
}

// ---------------------------------------------------------------------------
// EncodingTask
// ---------------------------------------------------------------------------

/// One unit of work within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingTask {
    pub id: TaskId,
    pub job_id: JobId,
    /// Position in the job's execution order.
    pub sequence: u32,
    pub task_type: TaskType,
    /// Heuristic cost, frozen at creation.
    pub weight: f64,
    pub state: TaskState,
    /// Tasks that must be `completed` before this one may start.
    pub dependencies: Vec<TaskId>,
    pub assigned_node: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EncodingTask {
    /// A fresh `pending` task.
    pub fn new(job_id: JobId, sequence: u32, task_type: TaskType, weight: f64) -> Self {
        Self {
            id: TaskId::new(),
            job_id,
            sequence,
            task_type,
            weight,
            state: TaskState::Pending,
            dependencies: Vec::new(),
            assigned_node: None,
            retry_count: 0,
            max_retries: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether the outer retry policy may schedule another attempt.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn apply(&mut self, transition: &TaskTransition, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(transition.to) {
            return Err(Error::InvalidState(format!(
                "task {}: {} -> {}",
                self.id, self.state, transition.to
            )));
        }

        self.state = transition.to;
        if transition.to == TaskState::Processing {
            self.started_at = Some(now);
        }
        if transition.to.is_terminal() {
            self.completed_at = Some(now);
        }
        if let Some(ref message) = transition.error_message {
            self.error_message = Some(message.clone());
        }
        if let Some(ref node) = transition.assigned_node {
            self.assigned_node = Some(node.clone());
        }
        Ok(())
    }
}

/// A requested task state change.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTransition {
    pub to: TaskState,
    pub error_message: Option<String>,
    pub assigned_node: Option<String>,
}

impl TaskTransition {
    pub fn to(state: TaskState) -> Self {
        Self {
            to: state,
            error_message: None,
            assigned_node: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.assigned_node = Some(node.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EncodingProgress
// ---------------------------------------------------------------------------

/// An immutable progress sample recorded while a task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProgress {
    pub id: ProgressId,
    pub job_id: JobId,
    pub task_id: TaskId,
    /// Completion in `[0, 100]`.
    pub percentage: f64,
    pub frame: u64,
    pub fps: f64,
    /// Encoding speed as a multiple of real time.
    pub speed: f64,
    pub bitrate_kbps: f64,
    /// Position reached in the output timeline, in seconds.
    pub current_time_secs: f64,
    /// Seconds remaining; `None` until the speed is known.
    pub eta_secs: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
