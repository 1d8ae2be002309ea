//! Repository ports consumed by the executor and the progress monitor.
//!
//! Implementations must serialize conflicting writes per entity id: two
//! concurrent transitions of the same job never both succeed from the same
//! starting state.

use async_trait::async_trait;
use ef_codec::EncodingProfile;
use ef_core::{
    EncodingJob, EncodingProgress, EncodingTask, JobId, JobState, JobTransition, ProfileId,
    Result, TaskId, TaskState, TaskTransition,
};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a new job together with its tasks, atomically.
    async fn create_job(&self, job: &EncodingJob, tasks: &[EncodingTask]) -> Result<()>;

    async fn get_job(&self, id: JobId) -> Result<Option<EncodingJob>>;

    /// Jobs in creation order, optionally filtered by state.
    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<EncodingJob>>;

    /// Apply `transition` to the stored job.
    ///
    /// # Errors
    ///
    /// [`ef_core::Error::NotFound`] for an unknown id and
    /// [`ef_core::Error::InvalidState`] when the stored state does not allow
    /// the transition; the stored job is left untouched in both cases.
    async fn transition_job(&self, id: JobId, transition: &JobTransition) -> Result<EncodingJob>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get_task(&self, id: TaskId) -> Result<Option<EncodingTask>>;

    /// Tasks of one job in sequence order.
    async fn list_tasks(&self, job_id: JobId) -> Result<Vec<EncodingTask>>;

    async fn list_tasks_in_state(&self, state: TaskState) -> Result<Vec<EncodingTask>>;

    /// Same contract as [`JobRepository::transition_job`].
    async fn transition_task(&self, id: TaskId, transition: &TaskTransition)
        -> Result<EncodingTask>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Append a sample. Samples are never updated.
    async fn append_progress(&self, progress: &EncodingProgress) -> Result<()>;

    async fn latest_progress(&self, task_id: TaskId) -> Result<Option<EncodingProgress>>;

    /// Every sample of a task, oldest first.
    async fn list_progress(&self, task_id: TaskId) -> Result<Vec<EncodingProgress>>;

    /// The newest sample of each task of `job_id` that has any.
    async fn latest_progress_for_job(&self, job_id: JobId) -> Result<Vec<EncodingProgress>>;
}

/// Storage for user profiles. System profiles never reach a repository.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert or replace by id.
    ///
    /// # Errors
    ///
    /// [`ef_core::Error::Conflict`] when another profile already uses the
    /// same name.
    async fn save_profile(&self, profile: &EncodingProfile) -> Result<()>;

    async fn get_profile(&self, id: ProfileId) -> Result<Option<EncodingProfile>>;

    async fn find_profile_by_name(&self, name: &str) -> Result<Option<EncodingProfile>>;

    /// Profiles ordered by name.
    async fn list_profiles(&self) -> Result<Vec<EncodingProfile>>;

    /// Returns whether a profile was removed.
    async fn delete_profile(&self, id: ProfileId) -> Result<bool>;

    async fn profile_exists(&self, id: ProfileId) -> Result<bool> {
        Ok(self.get_profile(id).await?.is_some())
    }

    /// The profile flagged `is_default`, if any.
    async fn default_profile(&self) -> Result<Option<EncodingProfile>>;
}

/// Every port at once; what the executor holds.
pub trait Store: JobRepository + TaskRepository + ProgressRepository + ProfileRepository {}

impl<T> Store for T where
    T: JobRepository + TaskRepository + ProgressRepository + ProfileRepository + ?Sized
{
}
