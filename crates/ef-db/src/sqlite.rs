//! SQLite-backed store.

use std::path::Path;

use async_trait::async_trait;
use ef_codec::EncodingProfile;
use ef_core::{
    EncodingJob, EncodingProgress, EncodingTask, JobId, JobState, JobTransition, ProfileId,
    Result, TaskId, TaskState, TaskTransition,
};

use crate::pool::{self, get_conn, DbPool};
use crate::queries;
use crate::repository::{JobRepository, ProfileRepository, ProgressRepository, TaskRepository};

/// Every repository port over an r2d2 SQLite pool.
///
/// Queries are short and run on the calling task. Transitions take an
/// immediate transaction, so SQLite's write lock serializes them.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (creating and migrating as needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(pool::init_pool(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(pool::init_memory_pool()?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobRepository for SqliteStore {
    async fn create_job(&self, job: &EncodingJob, tasks: &[EncodingTask]) -> Result<()> {
        let mut conn = get_conn(&self.pool)?;
        queries::jobs::create_job(&mut conn, job, tasks)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<EncodingJob>> {
        let conn = get_conn(&self.pool)?;
        queries::jobs::get_job(&conn, id)
    }

    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<EncodingJob>> {
        let conn = get_conn(&self.pool)?;
        queries::jobs::list_jobs(&conn, state)
    }

    async fn transition_job(&self, id: JobId, transition: &JobTransition) -> Result<EncodingJob> {
        let mut conn = get_conn(&self.pool)?;
        queries::jobs::transition_job(&mut conn, id, transition)
    }
}

#[async_trait]
impl TaskRepository for SqliteStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<EncodingTask>> {
        let conn = get_conn(&self.pool)?;
        queries::tasks::get_task(&conn, id)
    }

    async fn list_tasks(&self, job_id: JobId) -> Result<Vec<EncodingTask>> {
        let conn = get_conn(&self.pool)?;
        queries::tasks::list_tasks(&conn, job_id)
    }

    async fn list_tasks_in_state(&self, state: TaskState) -> Result<Vec<EncodingTask>> {
        let conn = get_conn(&self.pool)?;
        queries::tasks::list_tasks_in_state(&conn, state)
    }

    async fn transition_task(
        &self,
        id: TaskId,
        transition: &TaskTransition,
    ) -> Result<EncodingTask> {
        let mut conn = get_conn(&self.pool)?;
        queries::tasks::transition_task(&mut conn, id, transition)
    }
}

#[async_trait]
impl ProgressRepository for SqliteStore {
    async fn append_progress(&self, progress: &EncodingProgress) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        queries::progress::append_progress(&conn, progress)
    }

    async fn latest_progress(&self, task_id: TaskId) -> Result<Option<EncodingProgress>> {
        let conn = get_conn(&self.pool)?;
        queries::progress::latest_progress(&conn, task_id)
    }

    async fn list_progress(&self, task_id: TaskId) -> Result<Vec<EncodingProgress>> {
        let conn = get_conn(&self.pool)?;
        queries::progress::list_progress(&conn, task_id)
    }

    async fn latest_progress_for_job(&self, job_id: JobId) -> Result<Vec<EncodingProgress>> {
        let conn = get_conn(&self.pool)?;
        queries::progress::latest_progress_for_job(&conn, job_id)
    }
}

#[async_trait]
impl ProfileRepository for SqliteStore {
    async fn save_profile(&self, profile: &EncodingProfile) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::save_profile(&conn, profile)
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<EncodingProfile>> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::get_profile(&conn, id)
    }

    async fn find_profile_by_name(&self, name: &str) -> Result<Option<EncodingProfile>> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::find_profile_by_name(&conn, name)
    }

    async fn list_profiles(&self) -> Result<Vec<EncodingProfile>> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::list_profiles(&conn)
    }

    async fn delete_profile(&self, id: ProfileId) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::delete_profile(&conn, id)
    }

    async fn default_profile(&self) -> Result<Option<EncodingProfile>> {
        let conn = get_conn(&self.pool)?;
        queries::profiles::default_profile(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn job_lifecycle() {
        contract::job_lifecycle(&store()).await;
    }

    #[tokio::test]
    async fn illegal_transitions_leave_state_alone() {
        contract::illegal_transitions_leave_state_alone(&store()).await;
    }

    #[tokio::test]
    async fn task_ordering_and_states() {
        contract::task_ordering_and_states(&store()).await;
    }

    #[tokio::test]
    async fn progress_is_append_only() {
        contract::progress_is_append_only(&store()).await;
    }

    #[tokio::test]
    async fn profile_crud() {
        contract::profile_crud(&store()).await;
    }

    #[tokio::test]
    async fn unknown_ids() {
        contract::unknown_ids(&store()).await;
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ef.db");
        let (job, tasks) = contract::sample_job();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_job(&job, &tasks).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let back = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(back, job);
        assert_eq!(store.list_tasks(job.id).await.unwrap(), tasks);
    }
}
