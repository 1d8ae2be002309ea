//! Profile + source analysis to a single ffmpeg invocation.

use std::path::{Path, PathBuf};

use ef_codec::{Arg, AudioOutputConfig, Codec, EncodingProfile, VideoCodec, VideoOutputConfig};
use ef_core::{Result, StreamType};
use ef_probe::StreamAnalysis;
use tracing::debug;

use crate::builder::CommandBuilder;
use crate::filter::FilterGraph;
use crate::hwaccel::{self, HardwareAccelerator};
use crate::scale::{self, ScaleDecision};
use crate::tonemap;

/// Master playlist written next to the variant folders.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Bitrate ceiling relative to the target, for `-maxrate`.
const MAXRATE_FACTOR: f64 = 1.07;
/// Rate-control buffer relative to the target, for `-bufsize`.
const BUFSIZE_FACTOR: f64 = 1.5;

// ---------------------------------------------------------------------------
// Renditions
// ---------------------------------------------------------------------------

/// A video output that survives the scale policy for a given source.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition<'a> {
    /// Position among the surviving renditions; the output stream index.
    pub index: usize,
    pub output: &'a VideoOutputConfig,
    pub codec: &'a VideoCodec,
    pub decision: ScaleDecision,
}

/// The video outputs of `profile` that will be produced from this source.
///
/// Outputs skipped for avoiding upscaling are dropped. When that would
/// drop every output, the smallest one is kept at source resolution so
/// the job still produces video.
pub fn plan_renditions<'a>(
    profile: &'a EncodingProfile,
    analysis: &StreamAnalysis,
) -> Vec<Rendition<'a>> {
    if analysis.video_streams.is_empty() {
        return Vec::new();
    }
    let source = analysis.resolution();

    let candidates: Vec<(&VideoOutputConfig, &VideoCodec, ScaleDecision)> = profile
        .video_outputs
        .iter()
        .filter_map(|o| o.codec.as_ref().map(|c| (o, c, scale::decide(o, source))))
        .collect();

    let mut kept: Vec<_> = candidates
        .iter()
        .filter(|(output, _, decision)| {
            let keep = *decision != ScaleDecision::Skip;
            if !keep {
                debug!(rendition = %output.name, ?source, "Skipping rendition larger than source");
            }
            keep
        })
        .copied()
        .collect();

    if kept.is_empty() {
        let smallest = candidates.iter().min_by_key(|(o, _, _)| {
            u64::from(o.width.unwrap_or(u32::MAX)) * u64::from(o.height.unwrap_or(u32::MAX))
        });
        if let Some(&(output, codec, _)) = smallest {
            debug!(rendition = %output.name, "Keeping smallest rendition at source resolution");
            kept.push((output, codec, ScaleDecision::PassThrough));
        }
    }

    kept.into_iter()
        .enumerate()
        .map(|(index, (output, codec, decision))| Rendition {
            index,
            output,
            codec,
            decision,
        })
        .collect()
}

/// Where the primary output of a job lands inside `output_folder`.
///
/// HLS jobs write `index.m3u8`; a multi-rendition HLS command later moves
/// it under per-variant folders. Other containers write `<stem>.<ext>`.
pub fn primary_output_path(profile: &EncodingProfile, output_folder: &Path, stem: &str) -> PathBuf {
    match profile.container.hls() {
        Some(_) => output_folder.join("index.m3u8"),
        None => output_folder.join(format!("{stem}.{}", profile.container.extension())),
    }
}

// ---------------------------------------------------------------------------
// CommandSynthesizer
// ---------------------------------------------------------------------------

/// Deterministic profile-to-command translation.
#[derive(Debug, Clone, Default)]
pub struct CommandSynthesizer {
    accelerators: Vec<HardwareAccelerator>,
}

/// One mapped audio or subtitle stream.
struct MappedStream<'a, T> {
    source_index: u32,
    config: &'a T,
}

impl CommandSynthesizer {
    /// A synthesizer that may decode with any of `accelerators`.
    pub fn new(accelerators: Vec<HardwareAccelerator>) -> Self {
        Self { accelerators }
    }

    pub fn accelerators(&self) -> &[HardwareAccelerator] {
        &self.accelerators
    }

    /// The flat, quoted command string.
    pub fn synthesize(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
        analysis: &StreamAnalysis,
    ) -> Result<String> {
        self.builder(input, output, profile, analysis)?.build()
    }

    /// The command as an argument vector.
    pub fn synthesize_args(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
        analysis: &StreamAnalysis,
    ) -> Result<Vec<String>> {
        self.builder(input, output, profile, analysis)?.build_args()
    }

    fn builder(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
        analysis: &StreamAnalysis,
    ) -> Result<CommandBuilder> {
        profile.validate().into_result()?;

        let mut b = CommandBuilder::new();
        b.global_option(if profile.options.overwrite { "-y" } else { "-n" });
        if let Some(hw) = hwaccel::select(profile, &self.accelerators) {
            debug!(accelerator = %hw.kind, "Using hardware decoding");
            b.input_args(hw.input_args.iter().cloned());
        }
        b.input(input.to_string_lossy());

        let renditions = plan_renditions(profile, analysis);
        let hls = profile.container.hls();
        let multi_variant = hls.is_some() && renditions.len() > 1;

        self.add_video(&mut b, &renditions, analysis);

        // HLS variants each carry their own copy of the audio.
        let audio = select_audio(profile, analysis);
        let audio: Vec<MappedStream<'_, AudioOutputConfig>> = if multi_variant {
            audio
                .into_iter()
                .take(1)
                .flat_map(|a| {
                    renditions.iter().map(move |_| MappedStream {
                        source_index: a.source_index,
                        config: a.config,
                    })
                })
                .collect()
        } else {
            audio
        };
        add_audio(&mut b, &audio);

        // Validation leaves HLS profiles without subtitle outputs.
        add_subtitles(&mut b, profile, analysis);

        let copy_flag = |on: bool| if on { "0" } else { "-1" };
        b.output_args(["-map_metadata", copy_flag(profile.options.copy_metadata)]);
        b.output_args(["-map_chapters", copy_flag(profile.options.copy_chapters)]);
        if let Some(threads) = profile.options.threads {
            b.output_arg(&Arg::new("-threads", threads));
        }

        for arg in profile.container.build_arguments() {
            b.output_arg(&arg);
        }

        let output = match hls {
            Some(options) => {
                let folder = output.parent().unwrap_or_else(|| Path::new(""));
                let file_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "index.m3u8".to_string());
                let variant_folder = if multi_variant {
                    folder.join("stream_%v")
                } else {
                    folder.to_path_buf()
                };

                for r in &renditions {
                    let codec_name = if r.codec.is_copy() {
                        analysis
                            .primary_video()
                            .map(|v| v.codec.as_str())
                            .unwrap_or_default()
                    } else {
                        r.codec.name()
                    };
                    if let Some(bsf) = options.bitstream_filter(codec_name) {
                        let arg = Arg::new("-bsf:v", bsf);
                        if renditions.len() > 1 {
                            b.output_arg(&arg.for_stream(StreamType::Video, r.index));
                        } else {
                            b.output_arg(&arg);
                        }
                    }
                }
                if renditions.iter().any(|r| !r.codec.is_copy()) {
                    b.output_arg(&Arg::new(
                        "-force_key_frames",
                        format!("expr:gte(t,n_forced*{})", options.segment_duration),
                    ));
                }

                let segment = format!("segment_%05d.{}", options.segment_type.extension());
                b.output_arg(&Arg::new(
                    "-hls_segment_filename",
                    variant_folder.join(segment).to_string_lossy(),
                ));
                if options.segment_type == ef_codec::SegmentType::Fmp4 {
                    b.output_arg(&Arg::new("-hls_fmp4_init_filename", "init.mp4"));
                }

                if multi_variant {
                    let map = renditions
                        .iter()
                        .map(|r| {
                            if audio.is_empty() {
                                format!("v:{}", r.index)
                            } else {
                                format!("v:{0},a:{0}", r.index)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    b.output_arg(&Arg::new("-var_stream_map", map));
                    b.output_arg(&Arg::new("-master_pl_name", MASTER_PLAYLIST));
                }
                variant_folder.join(file_name)
            }
            None => output.to_path_buf(),
        };

        b.output(output.to_string_lossy());
        Ok(b)
    }

    fn add_video(&self, b: &mut CommandBuilder, renditions: &[Rendition<'_>], analysis: &StreamAnalysis) {
        let chain_for = |r: &Rendition<'_>| -> Vec<String> {
            let mut filters = scale::scale_filters(r.output.scale_mode, r.decision);
            if tonemap::needs_tonemap(r.output.tone_map, Some(analysis)) {
                filters.extend(tonemap::tonemap_filters(r.codec.pixel_format.as_deref()));
            }
            filters.extend(r.output.filters.iter().cloned());
            filters
        };

        match renditions {
            [] => {}
            [r] => {
                b.output_args(["-map", "0:v:0"]);
                if !r.codec.is_copy() {
                    for f in chain_for(r) {
                        b.filter(f);
                    }
                }
                for arg in video_args(r) {
                    b.output_arg(&arg);
                }
            }
            _ => {
                let mut graph = FilterGraph::new();
                let encoded = renditions.iter().filter(|r| !r.codec.is_copy()).count();
                let mut branches = match encoded {
                    0 => Vec::new(),
                    1 => vec!["0:v:0".to_string()],
                    n => graph.split("0:v:0", n),
                }
                .into_iter();

                for r in renditions {
                    if r.codec.is_copy() {
                        b.output_args(["-map", "0:v:0"]);
                    } else if let Some(branch) = branches.next() {
                        let label = graph.chain(&branch, &chain_for(r), "v");
                        b.output_args(["-map".to_string(), format!("[{label}]")]);
                    }
                    for arg in video_args(r) {
                        b.output_arg(&arg.for_stream(StreamType::Video, r.index));
                    }
                }
                if !graph.is_empty() {
                    b.complex_filter(&graph);
                }
            }
        }
    }
}

/// Codec arguments followed by rate-control arguments.
fn video_args(r: &Rendition<'_>) -> Vec<Arg> {
    let mut args = r.codec.build_arguments();
    if let (Some(kbps), false) = (r.output.bitrate_kbps, r.codec.is_copy()) {
        args.push(Arg::new("-b:v", format!("{kbps}k")));
        args.push(Arg::new(
            "-maxrate",
            format!("{}k", (kbps as f64 * MAXRATE_FACTOR).round() as u64),
        ));
        args.push(Arg::new(
            "-bufsize",
            format!("{}k", (kbps as f64 * BUFSIZE_FACTOR).round() as u64),
        ));
    }
    args
}

fn language_matches(stream: Option<&str>, wanted: &str) -> bool {
    stream.is_some_and(|l| l.eq_ignore_ascii_case(wanted))
}

fn select_audio<'a>(
    profile: &'a EncodingProfile,
    analysis: &StreamAnalysis,
) -> Vec<MappedStream<'a, AudioOutputConfig>> {
    profile
        .audio_outputs
        .iter()
        .filter_map(|config| {
            let by_language = config.language.as_deref().and_then(|lang| {
                analysis
                    .audio_streams
                    .iter()
                    .find(|s| language_matches(s.language.as_deref(), lang))
            });
            match by_language.or_else(|| analysis.primary_audio()) {
                Some(stream) => Some(MappedStream {
                    source_index: stream.index,
                    config,
                }),
                None => {
                    debug!("Source has no audio; skipping audio output");
                    None
                }
            }
        })
        .collect()
}

fn add_audio(b: &mut CommandBuilder, streams: &[MappedStream<'_, AudioOutputConfig>]) {
    let scoped = streams.len() > 1;
    for (i, stream) in streams.iter().enumerate() {
        b.output_args(["-map".to_string(), format!("0:{}", stream.source_index)]);
        let Some(ref codec) = stream.config.codec else {
            continue;
        };
        for arg in codec.build_arguments() {
            if scoped {
                b.output_arg(&arg.for_stream(StreamType::Audio, i));
            } else {
                b.output_arg(&arg);
            }
        }
        if !stream.config.filters.is_empty() && !codec.is_copy() {
            let flag = if scoped {
                format!("-filter:a:{i}")
            } else {
                "-af".to_string()
            };
            b.output_args([flag, stream.config.filters.join(",")]);
        }
    }
}

fn add_subtitles(b: &mut CommandBuilder, profile: &EncodingProfile, analysis: &StreamAnalysis) {
    let mut mapped = Vec::new();
    for config in &profile.subtitle_outputs {
        let Some(ref codec) = config.codec else {
            continue;
        };
        // A text encoder cannot re-encode bitmap subtitles.
        let usable = analysis
            .subtitle_streams
            .iter()
            .filter(|s| codec.is_copy() || !s.is_bitmap());
        match (config.language.as_deref(), codec.is_copy()) {
            (Some(lang), _) => {
                if let Some(s) = usable
                    .clone()
                    .find(|s| language_matches(s.language.as_deref(), lang))
                {
                    mapped.push(MappedStream {
                        source_index: s.index,
                        config: codec,
                    });
                }
            }
            (None, true) => mapped.extend(usable.map(|s| MappedStream {
                source_index: s.index,
                config: codec,
            })),
            (None, false) => {
                let mut usable = usable.peekable();
                let first = usable.peek().map(|s| s.index);
                let chosen = usable.find(|s| s.default).map(|s| s.index).or(first);
                if let Some(index) = chosen {
                    mapped.push(MappedStream {
                        source_index: index,
                        config: codec,
                    });
                }
            }
        }
    }

    let scoped = mapped.len() > 1;
    for (i, stream) in mapped.iter().enumerate() {
        b.output_args(["-map".to_string(), format!("0:{}", stream.source_index)]);
        for arg in stream.config.build_arguments() {
            if scoped {
                b.output_arg(&arg.for_stream(StreamType::Subtitle, i));
            } else {
                b.output_arg(&arg);
            }
        }
    }
}
