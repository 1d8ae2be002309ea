//! Behaviour every store must share, run against each backend.

use assert_matches::assert_matches;
use chrono::Utc;
use ef_codec::{Container, EncodingProfile};
use ef_core::{
    EncodingJob, EncodingProgress, EncodingTask, Error, JobId, JobState, JobTransition, ProfileId,
    ProgressId, TaskId, TaskState, TaskTransition, TaskType,
};

use crate::repository::Store;

pub fn sample_job() -> (EncodingJob, Vec<EncodingTask>) {
    let mut job = EncodingJob::new("/media/in.mkv", "/media/out", ProfileId::new(), "{}".into());
    job.weight = 1.25;
    let first = EncodingTask::new(job.id, 0, TaskType::Transcode, 1.2);
    let mut second = EncodingTask::new(job.id, 1, TaskType::Thumbnails, 0.05);
    second.dependencies = vec![first.id];
    second.max_retries = 3;
    (job, vec![first, second])
}

fn sample(job_id: JobId, task_id: TaskId, percentage: f64) -> EncodingProgress {
    EncodingProgress {
        id: ProgressId::new(),
        job_id,
        task_id,
        percentage,
        frame: 10,
        fps: 24.0,
        speed: 1.0,
        bitrate_kbps: 4500.0,
        current_time_secs: 1.0,
        eta_secs: Some(9.0),
        recorded_at: Utc::now(),
    }
}

pub async fn job_lifecycle(store: &dyn Store) {
    let (job, tasks) = sample_job();
    store.create_job(&job, &tasks).await.unwrap();

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.state, JobState::Queued);
    assert_eq!(stored.weight, 1.25);

    let running = store
        .transition_job(job.id, &JobTransition::to(JobState::Processing))
        .await
        .unwrap();
    assert!(running.started_at.is_some());

    let done = store
        .transition_job(job.id, &JobTransition::to(JobState::Completed))
        .await
        .unwrap();
    assert!(done.completed_at.is_some());
    assert!(done.execution_time_ms.is_some());

    assert_eq!(store.list_jobs(Some(JobState::Completed)).await.unwrap().len(), 1);
    assert!(store.list_jobs(Some(JobState::Queued)).await.unwrap().is_empty());
    assert_eq!(store.list_jobs(None).await.unwrap().len(), 1);
}

pub async fn illegal_transitions_leave_state_alone(store: &dyn Store) {
    let (job, tasks) = sample_job();
    store.create_job(&job, &tasks).await.unwrap();

    let err = store
        .transition_job(job.id, &JobTransition::to(JobState::Completed))
        .await
        .unwrap_err();
    assert_matches!(err, Error::InvalidState(_));
    assert_eq!(store.get_job(job.id).await.unwrap().unwrap().state, JobState::Queued);

    store
        .transition_job(job.id, &JobTransition::to(JobState::Cancelled))
        .await
        .unwrap();
    // Terminal.
    assert_matches!(
        store
            .transition_job(job.id, &JobTransition::to(JobState::Processing))
            .await,
        Err(Error::InvalidState(_))
    );
}

pub async fn task_ordering_and_states(store: &dyn Store) {
    let (job, tasks) = sample_job();
    store.create_job(&job, &tasks).await.unwrap();

    let listed = store.list_tasks(job.id).await.unwrap();
    assert_eq!(listed, tasks);
    assert_eq!(listed[1].dependencies, vec![listed[0].id]);

    let t = store
        .transition_task(
            tasks[0].id,
            &TaskTransition::to(TaskState::Processing).on_node("node-a"),
        )
        .await
        .unwrap();
    assert_eq!(t.assigned_node.as_deref(), Some("node-a"));
    assert_eq!(
        store.list_tasks_in_state(TaskState::Processing).await.unwrap()[0].id,
        tasks[0].id
    );

    let failed = store
        .transition_task(
            tasks[0].id,
            &TaskTransition::to(TaskState::Failed).with_error("exit 1"),
        )
        .await
        .unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("exit 1"));
    assert!(failed.completed_at.is_some());

    assert_matches!(
        store
            .transition_task(tasks[1].id, &TaskTransition::to(TaskState::Completed))
            .await,
        Err(Error::InvalidState(_))
    );
    let untouched = store.get_task(tasks[1].id).await.unwrap().unwrap();
    assert_eq!(untouched.state, TaskState::Pending);
}

pub async fn progress_is_append_only(store: &dyn Store) {
    let (job, tasks) = sample_job();
    store.create_job(&job, &tasks).await.unwrap();

    assert!(store.latest_progress(tasks[0].id).await.unwrap().is_none());
    assert!(store.latest_progress_for_job(job.id).await.unwrap().is_empty());

    for pct in [10.0, 20.0, 30.0] {
        store
            .append_progress(&sample(job.id, tasks[0].id, pct))
            .await
            .unwrap();
    }
    store
        .append_progress(&sample(job.id, tasks[1].id, 5.0))
        .await
        .unwrap();

    let history = store.list_progress(tasks[0].id).await.unwrap();
    let pcts: Vec<f64> = history.iter().map(|p| p.percentage).collect();
    assert_eq!(pcts, vec![10.0, 20.0, 30.0]);

    let latest = store.latest_progress(tasks[0].id).await.unwrap().unwrap();
    assert_eq!(latest.percentage, 30.0);

    let mut per_task: Vec<f64> = store
        .latest_progress_for_job(job.id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.percentage)
        .collect();
    per_task.sort_by(f64::total_cmp);
    assert_eq!(per_task, vec![5.0, 30.0]);
}

pub async fn profile_crud(store: &dyn Store) {
    let mut profile = EncodingProfile::new("Web Custom", Container::Matroska);
    store.save_profile(&profile).await.unwrap();
    assert!(store.profile_exists(profile.id).await.unwrap());
    assert!(store.default_profile().await.unwrap().is_none());

    let by_name = store.find_profile_by_name("web custom").await.unwrap().unwrap();
    assert_eq!(by_name.id, profile.id);

    profile.is_default = true;
    profile.description = Some("edited".into());
    store.save_profile(&profile).await.unwrap();
    let default = store.default_profile().await.unwrap().unwrap();
    assert_eq!(default.description.as_deref(), Some("edited"));

    let clash = EncodingProfile::new("WEB CUSTOM", Container::Matroska);
    assert_matches!(store.save_profile(&clash).await, Err(Error::Conflict(_)));

    let other = EncodingProfile::new("Archive", Container::Matroska);
    store.save_profile(&other).await.unwrap();
    let names: Vec<String> = store
        .list_profiles()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Archive", "Web Custom"]);

    assert!(store.delete_profile(profile.id).await.unwrap());
    assert!(!store.delete_profile(profile.id).await.unwrap());
    assert!(!store.profile_exists(profile.id).await.unwrap());
}

pub async fn unknown_ids(store: &dyn Store) {
    assert!(store.get_job(JobId::new()).await.unwrap().is_none());
    assert!(store.get_task(TaskId::new()).await.unwrap().is_none());
    assert!(store.get_profile(ProfileId::new()).await.unwrap().is_none());

    let err = store
        .transition_job(JobId::new(), &JobTransition::to(JobState::Processing))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = store
        .transition_task(TaskId::new(), &TaskTransition::to(TaskState::Processing))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
