//! Benchmarks for command synthesis and job weighting
//!
//! Measures how long it takes to turn each system profile plus a source
//! analysis into an ffmpeg command line and a task plan.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ef_codec::catalog;
use ef_command::synthesizer::primary_output_path;
use ef_command::CommandSynthesizer;
use ef_core::HdrFormat;
use ef_planner::{job_weight, TaskSplitter};
use ef_probe::{AudioStream, StreamAnalysis, VideoStream};
use std::path::Path;

/// A two hour 4K HDR10 source with two audio tracks
fn uhd_hdr_source() -> StreamAnalysis {
    let mut analysis = StreamAnalysis::new("/movies/uhd.mkv");
    analysis.file_size = 60 * 1024 * 1024 * 1024;
    analysis.format_name = "matroska,webm".to_string();
    analysis.duration_secs = 7200.0;
    analysis.bit_rate = Some(60_000_000);
    analysis.is_hdr = true;
    analysis.video_streams.push(VideoStream {
        index: 0,
        codec: "hevc".to_string(),
        width: 3840,
        height: 2160,
        frame_rate: Some(23.976),
        bit_depth: Some(10),
        pixel_format: Some("yuv420p10le".to_string()),
        color_primaries: Some("bt2020".to_string()),
        color_transfer: Some("smpte2084".to_string()),
        color_space: Some("bt2020nc".to_string()),
        hdr_format: HdrFormat::Hdr10,
        default: true,
        language: None,
    });
    for (index, channels) in [(1, 8), (2, 2)] {
        analysis.audio_streams.push(AudioStream {
            index,
            codec: "truehd".to_string(),
            channels,
            sample_rate: Some(48_000),
            bit_rate: None,
            language: Some("eng".to_string()),
            default: index == 1,
        });
    }
    analysis
}

fn bench_synthesize(c: &mut Criterion) {
    let analysis = uhd_hdr_source();
    let synthesizer = CommandSynthesizer::new(Vec::new());
    let mut group = c.benchmark_group("synthesize");

    for profile in catalog::system_profiles() {
        let output = primary_output_path(&profile, Path::new("/out"), "uhd");
        group.bench_with_input(
            BenchmarkId::from_parameter(&profile.name),
            &profile,
            |b, profile| {
                b.iter(|| {
                    synthesizer
                        .synthesize(
                            black_box(&analysis.path),
                            black_box(&output),
                            black_box(profile),
                            black_box(&analysis),
                        )
                        .ok()
                })
            },
        );
    }
    group.finish();
}

fn bench_planning(c: &mut Criterion) {
    let analysis = uhd_hdr_source();
    let profiles = catalog::system_profiles();

    c.bench_function("job_weight_all_profiles", |b| {
        b.iter(|| {
            profiles
                .iter()
                .map(|p| job_weight(black_box(p), black_box(&analysis)))
                .sum::<f64>()
        })
    });

    c.bench_function("split_all_profiles", |b| {
        b.iter(|| {
            profiles
                .iter()
                .map(|p| TaskSplitter.split(black_box(p), black_box(&analysis)).len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_synthesize, bench_planning);
criterion_main!(benches);
