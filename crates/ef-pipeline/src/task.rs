//! Running a single task: state transitions around one external process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ef_av::{ProcessRequest, ProcessRunner};
use ef_core::events::{EventPayload, TelemetrySink};
use ef_core::{EncodingTask, Error, JobId, JobState, Result, TaskState, TaskTransition, TaskType};
use ef_db::{JobRepository, Store, TaskRepository};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressMonitor;

/// The synthesized command for each task type of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommands {
    pub transcode: String,
    pub thumbnails: Option<String>,
}

impl TaskCommands {
    pub fn for_type(&self, task_type: TaskType) -> Option<&str> {
        match task_type {
            TaskType::Transcode => Some(&self.transcode),
            TaskType::Thumbnails => self.thumbnails.as_deref(),
        }
    }
}

/// How a task's process ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Everything needed to run the tasks of one job.
///
/// Shared by reference across a strategy's concurrent tasks.
pub struct TaskRunner {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) runner: Arc<dyn ProcessRunner>,
    pub(crate) sink: Arc<dyn TelemetrySink>,
    pub(crate) commands: TaskCommands,
    pub(crate) working_dir: PathBuf,
    pub(crate) duration_secs: f64,
    pub(crate) node_name: String,
    pub(crate) progress_interval: Duration,
}

impl TaskRunner {
    async fn transition(&self, task: &EncodingTask, transition: TaskTransition) -> Result<()> {
        let updated = self.store.transition_task(task.id, &transition).await?;
        self.sink.publish(EventPayload::TaskStateChanged {
            job_id: updated.job_id,
            task_id: updated.id,
            state: updated.state,
            error: updated.error_message,
        });
        Ok(())
    }

    async fn job_cancelled(&self, job_id: JobId) -> Result<bool> {
        let job = self.store.get_job(job_id).await?;
        Ok(job.is_some_and(|j| j.state == JobState::Cancelled))
    }

    /// Mark `task` processing, run its command and record how it ended.
    ///
    /// A task whose job was cancelled in the store is not started and stays
    /// `pending`. Store failures propagate; process failures are reported
    /// as [`TaskOutcome::Failed`] with the task already marked failed.
    pub async fn run(&self, task: &EncodingTask, cancel: &CancellationToken) -> Result<TaskOutcome> {
        if self.job_cancelled(task.job_id).await? {
            tracing::debug!(task_id = %task.id, "Job cancelled; not starting task");
            return Ok(TaskOutcome::Cancelled);
        }
        let command = self
            .commands
            .for_type(task.task_type)
            .ok_or_else(|| {
                Error::pipeline(task.task_type.as_str(), "no command synthesized for task")
            })?
            .to_string();

        self.transition(
            task,
            TaskTransition::to(TaskState::Processing).on_node(&self.node_name),
        )
        .await?;
        tracing::info!(
            job_id = %task.job_id,
            task_id = %task.id,
            task_type = %task.task_type,
            "Task started"
        );

        let outcome = self.run_process(task, command, cancel).await;

        match outcome {
            Ok(outcome) if outcome.success() => {
                self.transition(task, TaskTransition::to(TaskState::Completed))
                    .await?;
                tracing::info!(task_id = %task.id, "Task completed");
                Ok(TaskOutcome::Completed)
            }
            Ok(outcome) => {
                let message = format!("exit code {}: {}", outcome.exit_code, outcome.stderr);
                self.transition(
                    task,
                    TaskTransition::to(TaskState::Failed).with_error(&message),
                )
                .await?;
                tracing::warn!(task_id = %task.id, exit_code = outcome.exit_code, "Task failed");
                Ok(TaskOutcome::Failed(message))
            }
            Err(Error::Cancelled) => {
                self.transition(task, TaskTransition::to(TaskState::Cancelled))
                    .await?;
                tracing::info!(task_id = %task.id, "Task cancelled");
                Ok(TaskOutcome::Cancelled)
            }
            Err(e) => {
                let message = e.to_string();
                self.transition(
                    task,
                    TaskTransition::to(TaskState::Failed).with_error(&message),
                )
                .await?;
                tracing::warn!(task_id = %task.id, error = %e, "Task could not run");
                Ok(TaskOutcome::Failed(message))
            }
        }
    }

    async fn run_process(
        &self,
        task: &EncodingTask,
        command: String,
        cancel: &CancellationToken,
    ) -> Result<ef_av::ProcessOutcome> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut monitor = ProgressMonitor::new(
            task.job_id,
            task.id,
            self.duration_secs,
            self.store.clone(),
            self.sink.clone(),
        )
        .with_interval(self.progress_interval);

        let request = ProcessRequest::new(command).in_dir(&self.working_dir);
        let process = self.runner.run(request, tx, cancel.clone());
        let progress = async {
            while let Some(chunk) = rx.recv().await {
                // Best effort.
                if let Err(e) = monitor.record(&chunk).await {
                    tracing::warn!(task_id = %task.id, error = %e, "Failed to record progress");
                }
            }
        };

        let (outcome, ()) = tokio::join!(process, progress);
        outcome
    }
}
