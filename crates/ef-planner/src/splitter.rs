//! Job decomposition into weighted task definitions.

use ef_codec::EncodingProfile;
use ef_core::{EncodingTask, JobId, TaskType};
use ef_probe::StreamAnalysis;
use serde::{Deserialize, Serialize};

use crate::weights;

/// Weight of thumbnail extraction per hour of source.
const THUMBNAIL_WEIGHT: f64 = 0.05;

/// A task to be created, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_type: TaskType,
    pub weight: f64,
    /// Positions of prerequisite definitions in the same list.
    pub depends_on: Vec<usize>,
}

impl TaskDefinition {
    pub fn new(task_type: TaskType, weight: f64) -> Self {
        Self {
            task_type,
            weight,
            depends_on: Vec::new(),
        }
    }

    pub fn after(mut self, index: usize) -> Self {
        self.depends_on.push(index);
        self
    }
}

/// Splits a job into tasks.
///
/// Every job gets one `transcode` task carrying the whole job weight: the
/// synthesized command produces every rendition in a single invocation.
/// A profile with thumbnails adds a `thumbnails` task that reads the
/// finished output (the source, for HLS) and runs after the transcode.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSplitter;

impl TaskSplitter {
    pub fn split(&self, profile: &EncodingProfile, analysis: &StreamAnalysis) -> Vec<TaskDefinition> {
        let mut defs = vec![TaskDefinition::new(
            TaskType::Transcode,
            weights::job_weight(profile, analysis),
        )];

        if profile.thumbnails.is_some() && !analysis.video_streams.is_empty() {
            let weight = THUMBNAIL_WEIGHT * analysis.duration_minutes() / 60.0;
            defs.push(TaskDefinition::new(TaskType::Thumbnails, weight).after(0));
        }

        tracing::debug!(
            profile = %profile.name,
            tasks = defs.len(),
            total_weight = defs.iter().map(|d| d.weight).sum::<f64>(),
            "Split job"
        );
        defs
    }
}

/// Turn definitions into pending tasks of `job_id`, resolving positional
/// dependencies into task ids. Out-of-range positions are dropped.
pub fn materialize(job_id: JobId, defs: &[TaskDefinition], max_retries: u32) -> Vec<EncodingTask> {
    let mut tasks: Vec<EncodingTask> = defs
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let mut task = EncodingTask::new(job_id, i as u32, def.task_type, def.weight);
            task.max_retries = max_retries;
            task
        })
        .collect();

    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    for (task, def) in tasks.iter_mut().zip(defs) {
        task.dependencies = def
            .depends_on
            .iter()
            .filter_map(|&i| ids.get(i).copied())
            .collect();
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_codec::{Container, ThumbnailConfig, VideoCodec, VideoEncoder, VideoOutputConfig};
    use ef_core::{HdrFormat, TaskState};
    use ef_probe::VideoStream;

    fn analysis() -> StreamAnalysis {
        let mut a = StreamAnalysis::new("/src.mkv");
        a.duration_secs = 7200.0;
        a.video_streams.push(VideoStream {
            index: 0,
            codec: "h264".into(),
            width: 1920,
            height: 1080,
            frame_rate: None,
            bit_depth: None,
            pixel_format: None,
            color_primaries: None,
            color_transfer: None,
            color_space: None,
            hdr_format: HdrFormat::Sdr,
            default: true,
            language: None,
        });
        a
    }

    fn profile() -> EncodingProfile {
        let mut p = EncodingProfile::new("mkv", Container::Matroska);
        p.video_outputs
            .push(VideoOutputConfig::new("main", VideoCodec::new(VideoEncoder::X264)));
        p
    }

    #[test]
    fn single_transcode_without_thumbnails() {
        let defs = TaskSplitter.split(&profile(), &analysis());
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].task_type, TaskType::Transcode);
        assert!((defs[0].weight - 2.0).abs() < 1e-9);
    }

    #[test]
    fn thumbnails_follow_transcode() {
        let mut p = profile();
        p.thumbnails = Some(ThumbnailConfig::default());
        let defs = TaskSplitter.split(&p, &analysis());
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].task_type, TaskType::Thumbnails);
        assert_eq!(defs[1].depends_on, vec![0]);
        assert!((defs[1].weight - 0.1).abs() < 1e-9);
    }

    #[test]
    fn audio_only_source_skips_thumbnails() {
        let mut p = profile();
        p.thumbnails = Some(ThumbnailConfig::default());
        let mut a = analysis();
        a.video_streams.clear();
        assert_eq!(TaskSplitter.split(&p, &a).len(), 1);
    }

    #[test]
    fn materialize_resolves_dependencies() {
        let job_id = JobId::new();
        let defs = vec![
            TaskDefinition::new(TaskType::Transcode, 1.0),
            TaskDefinition::new(TaskType::Thumbnails, 0.1).after(0).after(7),
        ];
        let tasks = materialize(job_id, &defs, 3);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.job_id == job_id));
        assert!(tasks.iter().all(|t| t.state == TaskState::Pending));
        assert_eq!(tasks[1].sequence, 1);
        assert_eq!(tasks[1].max_retries, 3);
        assert_eq!(tasks[1].dependencies, vec![tasks[0].id]);
        assert!(tasks[0].dependencies.is_empty());
    }
}
