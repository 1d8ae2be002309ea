//! In-process store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ef_codec::EncodingProfile;
use ef_core::{
    EncodingJob, EncodingProgress, EncodingTask, Error, JobId, JobState, JobTransition, ProfileId,
    Result, TaskId, TaskState, TaskTransition,
};
use parking_lot::RwLock;

use crate::repository::{JobRepository, ProfileRepository, ProgressRepository, TaskRepository};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, EncodingJob>,
    tasks: HashMap<TaskId, EncodingTask>,
    progress: Vec<EncodingProgress>,
    profiles: HashMap<ProfileId, EncodingProfile>,
}

/// Every repository port over maps behind one lock. The write lock is what
/// serializes conflicting transitions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create_job(&self, job: &EncodingJob, tasks: &[EncodingTask]) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.jobs.contains_key(&job.id) {
            return Err(Error::Conflict(format!("job {} already exists", job.id)));
        }
        if let Some(task) = tasks.iter().find(|t| t.job_id != job.id) {
            return Err(Error::Validation(format!(
                "task {} belongs to job {}, not {}",
                task.id, task.job_id, job.id
            )));
        }
        inner.jobs.insert(job.id, job.clone());
        for task in tasks {
            inner.tasks.insert(task.id, task.clone());
        }
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<EncodingJob>> {
        Ok(self.inner.read().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<EncodingJob>> {
        let inner = self.inner.read();
        let mut jobs: Vec<EncodingJob> = inner
            .jobs
            .values()
            .filter(|j| state.map_or(true, |s| j.state == s))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn transition_job(&self, id: JobId, transition: &JobTransition) -> Result<EncodingJob> {
        let mut inner = self.inner.write();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("job", id))?;
        let mut next = job.clone();
        next.apply(transition, Utc::now())?;
        *job = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<EncodingTask>> {
        Ok(self.inner.read().tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, job_id: JobId) -> Result<Vec<EncodingTask>> {
        let inner = self.inner.read();
        let mut tasks: Vec<EncodingTask> = inner
            .tasks
            .values()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.sequence);
        Ok(tasks)
    }

    async fn list_tasks_in_state(&self, state: TaskState) -> Result<Vec<EncodingTask>> {
        let inner = self.inner.read();
        let mut tasks: Vec<EncodingTask> = inner
            .tasks
            .values()
            .filter(|t| t.state == state)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.sequence));
        Ok(tasks)
    }

    async fn transition_task(
        &self,
        id: TaskId,
        transition: &TaskTransition,
    ) -> Result<EncodingTask> {
        let mut inner = self.inner.write();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("task", id))?;
        let mut next = task.clone();
        next.apply(transition, Utc::now())?;
        *task = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl ProgressRepository for MemoryStore {
    async fn append_progress(&self, progress: &EncodingProgress) -> Result<()> {
        self.inner.write().progress.push(progress.clone());
        Ok(())
    }

    async fn latest_progress(&self, task_id: TaskId) -> Result<Option<EncodingProgress>> {
        let inner = self.inner.read();
        Ok(inner
            .progress
            .iter()
            .rev()
            .find(|p| p.task_id == task_id)
            .cloned())
    }

    async fn list_progress(&self, task_id: TaskId) -> Result<Vec<EncodingProgress>> {
        let inner = self.inner.read();
        Ok(inner
            .progress
            .iter()
            .filter(|p| p.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn latest_progress_for_job(&self, job_id: JobId) -> Result<Vec<EncodingProgress>> {
        let inner = self.inner.read();
        let mut latest: HashMap<TaskId, &EncodingProgress> = HashMap::new();
        // Later samples overwrite earlier ones.
        for sample in inner.progress.iter().filter(|p| p.job_id == job_id) {
            latest.insert(sample.task_id, sample);
        }
        let mut out: Vec<EncodingProgress> = latest.into_values().cloned().collect();
        out.sort_by_key(|p| p.recorded_at);
        Ok(out)
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn save_profile(&self, profile: &EncodingProfile) -> Result<()> {
        let mut inner = self.inner.write();
        let clash = inner
            .profiles
            .values()
            .any(|p| p.id != profile.id && p.name.eq_ignore_ascii_case(&profile.name));
        if clash {
            return Err(Error::Conflict(format!(
                "a profile named '{}' already exists",
                profile.name
            )));
        }
        inner.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<EncodingProfile>> {
        Ok(self.inner.read().profiles.get(&id).cloned())
    }

    async fn find_profile_by_name(&self, name: &str) -> Result<Option<EncodingProfile>> {
        let inner = self.inner.read();
        Ok(inner
            .profiles
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<EncodingProfile>> {
        let inner = self.inner.read();
        let mut profiles: Vec<EncodingProfile> = inner.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    async fn delete_profile(&self, id: ProfileId) -> Result<bool> {
        Ok(self.inner.write().profiles.remove(&id).is_some())
    }

    async fn default_profile(&self) -> Result<Option<EncodingProfile>> {
        let inner = self.inner.read();
        let mut defaults: Vec<&EncodingProfile> =
            inner.profiles.values().filter(|p| p.is_default).collect();
        defaults.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(defaults.first().map(|p| (*p).clone()))
    }
}
