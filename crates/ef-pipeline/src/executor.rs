//! Job executor: creates jobs, drives them through their state machine and
//! reports on them.
//!
//! All durable state goes through the [`Store`]; the executor itself keeps
//! none between calls, so any number of executors may share one store.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ef_av::{HardwareDiscovery, NoHardware, ProcessRunner};
use ef_codec::EncodingProfile;
use ef_command::synthesizer::primary_output_path;
use ef_command::{thumbnail_command, CommandSynthesizer};
use ef_core::config::ExecutorConfig;
use ef_core::events::{EventPayload, NoopSink, TelemetrySink};
use ef_core::{
    EncodingJob, EncodingProgress, EncodingTask, Error, JobId, JobState, JobTransition, ProfileId,
    Result, TaskId, TaskState, TaskTransition,
};
use ef_db::{JobRepository, ProgressRepository, Store, TaskRepository};
use ef_planner::{estimate_job_time, materialize, TaskGraph, TaskSplitter};
use ef_probe::StreamAnalyzer;
use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::registry::ProfileRegistry;
use crate::strategy::{strategy_for, ExecutionStrategy, RunOutcome};
use crate::task::{TaskCommands, TaskRunner};

/// Thumbnails land in this folder inside the job's output folder.
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// Error recorded on work found `processing` after a restart.
const INTERRUPTED: &str = "interrupted";

/// Aggregated view of a job and its latest progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub job: EncodingJob,
    pub tasks: Vec<EncodingTask>,
    /// Mean of the latest percentage of every task that reported progress.
    pub percentage: f64,
    /// Longest remaining estimate among the tasks' latest samples.
    pub eta_secs: Option<f64>,
    /// Weight-based estimate of the whole job on this machine.
    pub estimated_secs: f64,
}

/// Mean percentage and longest ETA over each task's latest sample.
pub fn aggregate_progress(latest: &[EncodingProgress]) -> (f64, Option<f64>) {
    if latest.is_empty() {
        return (0.0, None);
    }
    let mean = latest.iter().map(|p| p.percentage).sum::<f64>() / latest.len() as f64;
    let eta = latest
        .iter()
        .filter_map(|p| p.eta_secs)
        .fold(None, |max: Option<f64>, e| Some(max.map_or(e, |m| m.max(e))));
    (mean, eta)
}

fn output_stem(job: &EncodingJob) -> String {
    job.input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Orchestrates encoding jobs.
pub struct JobExecutor {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn StreamAnalyzer>,
    runner: Arc<dyn ProcessRunner>,
    hardware: Arc<dyn HardwareDiscovery>,
    sink: Arc<dyn TelemetrySink>,
    strategy: Arc<dyn ExecutionStrategy>,
    profiles: ProfileRegistry,
    splitter: TaskSplitter,
    config: ExecutorConfig,
}

impl JobExecutor {
    /// An executor with the default configuration, no hardware acceleration
    /// and no telemetry.
    pub fn new(
        store: Arc<dyn Store>,
        analyzer: Arc<dyn StreamAnalyzer>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let config = ExecutorConfig::default();
        Self {
            profiles: ProfileRegistry::new(store.clone()),
            store,
            analyzer,
            runner,
            hardware: Arc::new(NoHardware),
            sink: Arc::new(NoopSink),
            strategy: strategy_for(config.strategy, config.max_parallel_tasks),
            splitter: TaskSplitter,
            config,
        }
    }

    /// Also selects the configured strategy.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.strategy = strategy_for(config.strategy, config.max_parallel_tasks);
        self.config = config;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_hardware(mut self, hardware: Arc<dyn HardwareDiscovery>) -> Self {
        self.hardware = hardware;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn strategy(&self) -> &dyn ExecutionStrategy {
        self.strategy.as_ref()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Analyze `input`, freeze the profile and persist a `queued` job with
    /// its tasks. Nothing is written unless every step succeeds.
    ///
    /// Both paths are stored absolute, resolved against the current
    /// directory, since tasks run with the output folder as their cwd.
    pub async fn create_job(
        &self,
        input: &Path,
        output_folder: &Path,
        profile_id: ProfileId,
    ) -> Result<EncodingJob> {
        let input_path = std::path::absolute(input)?;
        let output_folder = std::path::absolute(output_folder)?;
        let input = input_path.as_path();

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Error::not_found("file", input.display()));
        }
        let profile = self.profiles.require(profile_id).await?;
        profile.validate().into_result()?;

        let analysis = self.analyzer.analyze(input).await?;
        let snapshot = profile.to_snapshot()?;

        let defs = self.splitter.split(&profile, &analysis);
        let mut job = EncodingJob::new(input, &output_folder, profile.id, snapshot);
        let tasks = materialize(job.id, &defs, self.config.default_max_retries);
        TaskGraph::new(&tasks)?;
        job.weight = tasks.iter().map(|t| t.weight).sum();

        self.store.create_job(&job, &tasks).await?;
        tracing::info!(
            job_id = %job.id,
            input = %input.display(),
            profile = %profile.name,
            tasks = tasks.len(),
            weight = job.weight,
            "Job created"
        );
        self.publish_job(&job);
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run a queued job to a terminal state.
    ///
    /// Returns `false` without touching anything when the job is not
    /// `queued`, and `false` when it ends `failed` or `cancelled`. Errors
    /// and panics after the job started are recorded on the job instead of
    /// being returned, so it is never left `processing`.
    pub async fn execute_job(&self, job_id: JobId, cancel: CancellationToken) -> Result<bool> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", job_id))?;
        if job.state != JobState::Queued {
            tracing::debug!(job_id = %job_id, state = %job.state, "Job is not queued; skipping");
            return Ok(false);
        }

        let job = match self
            .transition_job(job_id, JobTransition::to(JobState::Processing))
            .await
        {
            Ok(job) => job,
            // Another executor got there first.
            Err(Error::InvalidState(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        tracing::info!(job_id = %job_id, strategy = self.strategy.name(), "Job started");

        let result = AssertUnwindSafe(self.run_job(&job, &cancel))
            .catch_unwind()
            .await;

        let state = match result {
            Ok(Ok(RunOutcome::Completed)) => {
                self.finish(job_id, JobTransition::to(JobState::Completed))
                    .await?
            }
            Ok(Ok(RunOutcome::Failed { task_id, error })) => {
                self.finish(
                    job_id,
                    JobTransition::to(JobState::Failed)
                        .with_error(error)
                        .with_failed_task(task_id),
                )
                .await?
            }
            Ok(Ok(RunOutcome::Cancelled)) | Ok(Err(Error::Cancelled)) => {
                self.cancel_pending_tasks(job_id).await?;
                self.finish(job_id, JobTransition::to(JobState::Cancelled))
                    .await?
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %job_id, error = %e, "Job aborted");
                self.abort(job_id, e.to_string()).await?
            }
            Err(panic) => {
                let message = format!("executor panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(job_id = %job_id, "{message}");
                self.abort(job_id, message).await?
            }
        };

        Ok(state == JobState::Completed)
    }

    async fn run_job(&self, job: &EncodingJob, cancel: &CancellationToken) -> Result<RunOutcome> {
        let profile = EncodingProfile::from_snapshot(&job.profile_snapshot)?;
        let analysis = self.analyzer.analyze(&job.input_path).await?;

        let accelerators = if profile.options.hardware_acceleration {
            self.hardware.discover().await
        } else {
            Vec::new()
        };
        let synthesizer = CommandSynthesizer::new(accelerators);

        let output = primary_output_path(&profile, &job.output_folder, &output_stem(job));
        tokio::fs::create_dir_all(&job.output_folder).await?;

        let transcode = synthesizer.synthesize(&job.input_path, &output, &profile, &analysis)?;
        let thumbnails = match profile.thumbnails {
            Some(ref config) => {
                let dir = job.output_folder.join(THUMBNAIL_DIR);
                tokio::fs::create_dir_all(&dir).await?;
                let source: &Path = if profile.container.hls().is_some() {
                    &job.input_path
                } else {
                    &output
                };
                Some(thumbnail_command(source, &dir, config)?)
            }
            None => None,
        };
        tracing::debug!(job_id = %job.id, command = %transcode, "Synthesized command");

        let runner = TaskRunner {
            store: self.store.clone(),
            runner: self.runner.clone(),
            sink: self.sink.clone(),
            commands: TaskCommands {
                transcode,
                thumbnails,
            },
            working_dir: job.output_folder.clone(),
            duration_secs: analysis.duration_secs,
            node_name: self.config.node_name.clone(),
            progress_interval: Duration::from_millis(self.config.progress_interval_ms),
        };

        let tasks = self.store.list_tasks(job.id).await?;
        self.strategy.run(&runner, tasks, cancel).await
    }

    /// Apply the final transition unless something (a cancel request)
    /// already settled the job.
    async fn finish(&self, job_id: JobId, transition: JobTransition) -> Result<JobState> {
        let current = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", job_id))?;
        if current.state.is_terminal() {
            tracing::info!(job_id = %job_id, state = %current.state, "Job already settled");
            return Ok(current.state);
        }
        let job = self.transition_job(job_id, transition).await?;
        match job.state {
            JobState::Completed => tracing::info!(
                job_id = %job_id,
                execution_time_ms = job.execution_time_ms,
                "Job completed"
            ),
            state => tracing::warn!(
                job_id = %job_id,
                state = %state,
                error = job.error_message.as_deref().unwrap_or_default(),
                "Job finished unsuccessfully"
            ),
        }
        Ok(job.state)
    }

    /// Force a job (and any task it left running) to `failed`.
    async fn abort(&self, job_id: JobId, message: String) -> Result<JobState> {
        let mut failed_task = None;
        for task in self.store.list_tasks(job_id).await? {
            if task.state == TaskState::Processing {
                self.transition_task(
                    task.id,
                    TaskTransition::to(TaskState::Failed).with_error(&message),
                )
                .await?;
                failed_task.get_or_insert(task.id);
            }
        }
        let mut transition = JobTransition::to(JobState::Failed).with_error(message);
        if let Some(task_id) = failed_task {
            transition = transition.with_failed_task(task_id);
        }
        self.finish(job_id, transition).await
    }

    async fn cancel_pending_tasks(&self, job_id: JobId) -> Result<()> {
        for task in self.store.list_tasks(job_id).await? {
            if task.state == TaskState::Pending {
                self.transition_task(task.id, TaskTransition::to(TaskState::Cancelled))
                    .await?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Cancel a `queued` or `processing` job.
    ///
    /// The job is marked `cancelled` at once. A queued job's tasks are
    /// cancelled with it; a running job stops before its next task, and
    /// the task in flight is stopped through the token its runner holds.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<EncodingJob> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", job_id))?;
        if !job.state.is_cancellable() {
            return Err(Error::InvalidState(format!(
                "job {job_id} is {}; only queued or processing jobs can be cancelled",
                job.state
            )));
        }

        let cancelled = self
            .transition_job(job_id, JobTransition::to(JobState::Cancelled))
            .await?;
        if job.state == JobState::Queued {
            self.cancel_pending_tasks(job_id).await?;
        }
        tracing::info!(job_id = %job_id, was = %job.state, "Job cancelled");
        Ok(cancelled)
    }

    /// Queue a fresh copy of a failed job, if its failed task still has
    /// retries left.
    ///
    /// The copy reuses the frozen profile snapshot, points back through
    /// `retry_of` and carries every task's retry count plus one.
    pub async fn retry_job(&self, job_id: JobId) -> Result<EncodingJob> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", job_id))?;
        if job.state != JobState::Failed {
            return Err(Error::InvalidState(format!(
                "job {job_id} is {}; only failed jobs can be retried",
                job.state
            )));
        }

        let tasks = self.store.list_tasks(job_id).await?;
        let budget = match job.failed_task_id {
            Some(id) => tasks.iter().find(|t| t.id == id),
            None => tasks.iter().max_by_key(|t| t.retry_count),
        }
        .ok_or_else(|| Error::InvalidState(format!("job {job_id} has no tasks to retry")))?;
        if !budget.can_retry() {
            return Err(Error::InvalidState(format!(
                "task {} exhausted its retries ({}/{})",
                budget.id, budget.retry_count, budget.max_retries
            )));
        }

        let mut retry = EncodingJob::new(
            job.input_path.clone(),
            job.output_folder.clone(),
            job.profile_id,
            job.profile_snapshot.clone(),
        );
        retry.weight = job.weight;
        retry.retry_of = Some(job.id);

        let fresh: Vec<TaskId> = tasks.iter().map(|_| TaskId::new()).collect();
        let remap = |id: &TaskId| {
            tasks
                .iter()
                .position(|t| t.id == *id)
                .map(|i| fresh[i])
        };
        let retry_tasks: Vec<EncodingTask> = tasks
            .iter()
            .zip(&fresh)
            .map(|(old, &id)| {
                let mut task = EncodingTask::new(retry.id, old.sequence, old.task_type, old.weight);
                task.id = id;
                task.max_retries = old.max_retries;
                task.retry_count = old.retry_count + 1;
                task.dependencies = old.dependencies.iter().filter_map(remap).collect();
                task
            })
            .collect();

        self.store.create_job(&retry, &retry_tasks).await?;
        tracing::info!(
            job_id = %retry.id,
            retry_of = %job.id,
            attempt = budget.retry_count + 1,
            "Job queued for retry"
        );
        self.publish_job(&retry);
        Ok(retry)
    }

    /// Fail work a crashed process left `processing`. Returns how many jobs
    /// were recovered.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let mut interrupted_tasks = Vec::new();
        for task in self.store.list_tasks_in_state(TaskState::Processing).await? {
            self.transition_task(
                task.id,
                TaskTransition::to(TaskState::Failed).with_error(INTERRUPTED),
            )
            .await?;
            interrupted_tasks.push(task);
        }

        let jobs = self.store.list_jobs(Some(JobState::Processing)).await?;
        for job in &jobs {
            let mut transition = JobTransition::to(JobState::Failed).with_error(INTERRUPTED);
            if let Some(task) = interrupted_tasks.iter().find(|t| t.job_id == job.id) {
                transition = transition.with_failed_task(task.id);
            }
            self.transition_job(job.id, transition).await?;
        }

        if !jobs.is_empty() || !interrupted_tasks.is_empty() {
            tracing::warn!(
                jobs = jobs.len(),
                tasks = interrupted_tasks.len(),
                "Recovered interrupted work"
            );
        }
        Ok(jobs.len())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_job_status(&self, job_id: JobId) -> Result<JobStatus> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", job_id))?;
        let tasks = self.store.list_tasks(job_id).await?;
        let latest = self.store.latest_progress_for_job(job_id).await?;
        let (percentage, eta_secs) = aggregate_progress(&latest);
        let estimated_secs =
            estimate_job_time(tasks.iter(), self.config.hardware_speed_factor).as_secs_f64();

        Ok(JobStatus {
            job,
            tasks,
            percentage,
            eta_secs,
            estimated_secs,
        })
    }

    pub async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<EncodingJob>> {
        self.store.list_jobs(state).await
    }

    /// Where a job's primary output lands.
    pub fn output_path(&self, job: &EncodingJob) -> Result<PathBuf> {
        let profile = EncodingProfile::from_snapshot(&job.profile_snapshot)?;
        Ok(primary_output_path(&profile, &job.output_folder, &output_stem(job)))
    }

    // -----------------------------------------------------------------------
    // Transitions with telemetry
    // -----------------------------------------------------------------------

    async fn transition_job(&self, job_id: JobId, transition: JobTransition) -> Result<EncodingJob> {
        let job = self.store.transition_job(job_id, &transition).await?;
        self.publish_job(&job);
        Ok(job)
    }

    async fn transition_task(
        &self,
        task_id: TaskId,
        transition: TaskTransition,
    ) -> Result<EncodingTask> {
        let task = self.store.transition_task(task_id, &transition).await?;
        self.sink.publish(EventPayload::TaskStateChanged {
            job_id: task.job_id,
            task_id: task.id,
            state: task.state,
            error: task.error_message.clone(),
        });
        Ok(task)
    }

    fn publish_job(&self, job: &EncodingJob) {
        self.sink.publish(EventPayload::JobStateChanged {
            job_id: job.id,
            state: job.state,
            error: job.error_message.clone(),
        });
    }
}
