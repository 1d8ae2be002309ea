//! Profile registry and snapshot integration tests.

mod common;

use assert_matches::assert_matches;
use common::{sample_analysis, ScriptedRunner, TestHarness};
use ef_codec::catalog::{self, HLS_ADAPTIVE, WEB_MP4};
use ef_codec::EncodingProfile;
use ef_command::CommandSynthesizer;
use ef_core::config::{ExecutorConfig, StrategyKind};
use ef_core::{Error, JobState, ProfileId, TaskState};
use ef_db::{JobRepository, TaskRepository};
use tokio_util::sync::CancellationToken;

fn house_profile() -> EncodingProfile {
    let mut profile = catalog::system_profile(WEB_MP4).unwrap();
    profile.id = ProfileId::new();
    profile.name = "house-mp4".to_string();
    profile.is_system = false;
    profile.video_outputs[0].bitrate_kbps = Some(4000);
    profile
}

#[tokio::test]
async fn registry_lists_system_then_user_profiles() {
    let h = TestHarness::new();
    let registry = h.executor.profiles();

    let saved = registry.save(house_profile()).await.unwrap();
    let all = registry.list().await.unwrap();
    assert_eq!(all.len(), catalog::system_profiles().len() + 1);
    assert!(all[..all.len() - 1].iter().all(|p| p.is_system));
    assert_eq!(all.last().unwrap().id, saved.id);

    assert_eq!(registry.resolve("house-mp4").await.unwrap().id, saved.id);
    assert_eq!(registry.default_profile().await.unwrap().id, HLS_ADAPTIVE);
}

#[tokio::test]
async fn system_profiles_cannot_be_changed() {
    let h = TestHarness::new();
    let registry = h.executor.profiles();

    let mut system = registry.require(HLS_ADAPTIVE).await.unwrap();
    system.video_outputs.clear();
    assert_matches!(registry.save(system).await, Err(Error::Forbidden(_)));
    assert_matches!(registry.delete(HLS_ADAPTIVE).await, Err(Error::Forbidden(_)));
    assert_eq!(
        registry.require(HLS_ADAPTIVE).await.unwrap(),
        catalog::system_profile(HLS_ADAPTIVE).unwrap()
    );
}

#[tokio::test]
async fn job_uses_profile_snapshot_taken_at_creation() {
    let h = TestHarness::new();
    let registry = h.executor.profiles();
    let original = registry.save(house_profile()).await.unwrap();

    let job = h
        .executor
        .create_job(&h.input, &h.output, original.id)
        .await
        .unwrap();

    // Editing the profile afterwards must not change the queued job.
    let mut edited = original.clone();
    edited.video_outputs[0].bitrate_kbps = Some(2500);
    registry.save(edited).await.unwrap();

    assert!(h
        .executor
        .execute_job(job.id, CancellationToken::new())
        .await
        .unwrap());

    let output = h.executor.output_path(&job).unwrap();
    assert_eq!(output, h.output.join("movie.mp4"));
    let expected = CommandSynthesizer::new(Vec::new())
        .synthesize(&h.input, &output, &original, &sample_analysis(&h.input))
        .unwrap();

    let commands = h.runner.commands();
    assert_eq!(commands[0], expected);
    assert!(commands[0].contains("-b:v 4000k"));
    assert!(!commands[0].contains("2500k"));
}

#[tokio::test]
async fn snapshot_round_trip_synthesizes_identical_command() {
    let analysis = sample_analysis("/media/movie.mkv");
    let synthesizer = CommandSynthesizer::new(Vec::new());

    for profile in catalog::system_profiles() {
        let restored = EncodingProfile::from_snapshot(&profile.to_snapshot().unwrap()).unwrap();
        assert_eq!(restored, profile);

        let output = ef_command::synthesizer::primary_output_path(
            &profile,
            std::path::Path::new("/out"),
            "movie",
        );
        let a = synthesizer
            .synthesize(&analysis.path, &output, &profile, &analysis)
            .unwrap();
        let b = synthesizer
            .synthesize(&analysis.path, &output, &restored, &analysis)
            .unwrap();
        assert_eq!(a, b, "profile {}", profile.name);
    }
}

#[tokio::test]
async fn invalid_profile_blocks_job_creation() {
    let h = TestHarness::new();
    let mut profile = house_profile();
    profile.video_outputs[0].codec = None;
    // Bypass the registry to get an invalid profile into storage.
    ef_db::ProfileRepository::save_profile(h.store.as_ref(), &profile)
        .await
        .unwrap();

    assert_matches!(
        h.executor.create_job(&h.input, &h.output, profile.id).await,
        Err(Error::Validation(_))
    );
    assert!(h.store.list_jobs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn dependency_strategy_completes_job() {
    let config = ExecutorConfig {
        strategy: StrategyKind::Dependency,
        max_parallel_tasks: 4,
        ..Default::default()
    };
    let h = TestHarness::with_config(ScriptedRunner::default(), config);
    assert_eq!(h.executor.strategy().name(), "dependency");

    let job = h
        .executor
        .create_job(&h.input, &h.output, HLS_ADAPTIVE)
        .await
        .unwrap();
    assert!(h
        .executor
        .execute_job(job.id, CancellationToken::new())
        .await
        .unwrap());

    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    let tasks = h.store.list_tasks(job.id).await.unwrap();
    assert!(tasks.iter().all(|t| t.state == TaskState::Completed));
    // Thumbnails depend on the transcode, so they still run second.
    assert!(h.runner.commands()[1].contains("thumbnails"));
}
