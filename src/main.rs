mod cli;

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands};
use ef_codec::EncodingProfile;
use ef_command::synthesizer::plan_renditions;
use ef_command::CommandSynthesizer;
use ef_core::config::Config;
use ef_core::events::EventPayload;
use ef_core::{JobId, JobState};
use ef_planner::{estimate_encoding_time, TaskSplitter};
use ef_pipeline::JobStatus;
use encodeforge::App;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "encodeforge=debug,ef_pipeline=debug,ef_av=debug,ef_db=debug,ef_command=debug,ef_planner=debug".to_string()
        } else {
            "encodeforge=info,ef_pipeline=info,ef_av=warn,ef_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::ValidateConfig {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        command => {
            let config = Config::load_or_default(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(dispatch(command, config))
        }
    }
}

async fn dispatch(command: Commands, mut config: Config) -> Result<()> {
    if let Commands::Run {
        strategy: Some(strategy),
        ..
    } = &command
    {
        config.executor.strategy = (*strategy).into();
    }
    let app = App::open(config)?;

    match command {
        Commands::Profiles => list_profiles(&app).await,
        Commands::ShowProfile { profile } => {
            let profile = app.executor.profiles().resolve(&profile).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            Ok(())
        }
        Commands::Probe { file, json } => probe_file(&app, &file, json).await,
        Commands::Plan { input, profile } => plan(&app, &input, profile.as_deref()).await,
        Commands::Command {
            input,
            output,
            profile,
        } => print_command(&app, &input, &output, profile.as_deref()).await,
        Commands::Run {
            input,
            output_folder,
            profile,
            ..
        } => run(&app, &input, &output_folder, profile.as_deref()).await,
        Commands::Jobs { state } => list_jobs(&app, state.as_deref()).await,
        Commands::Status { job_id, json } => {
            let status = app.executor.get_job_status(parse_job_id(&job_id)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
            Ok(())
        }
        Commands::Cancel { job_id } => {
            let job = app.executor.cancel_job(parse_job_id(&job_id)?).await?;
            println!("Job {} is {}", job.id, job.state);
            Ok(())
        }
        Commands::Retry { job_id, run } => {
            let job = app.executor.retry_job(parse_job_id(&job_id)?).await?;
            println!("Queued retry {} of {}", job.id, job_id);
            if run {
                execute(&app, job.id).await?;
            }
            Ok(())
        }
        Commands::CheckTools | Commands::ValidateConfig { .. } => unreachable!("handled in main"),
    }
}

fn parse_job_id(s: &str) -> Result<JobId> {
    s.parse().map_err(|e| anyhow!("invalid job id {s:?}: {e}"))
}

async fn resolve_profile(app: &App, profile: Option<&str>) -> Result<EncodingProfile> {
    let registry = app.executor.profiles();
    Ok(match profile {
        Some(p) => registry.resolve(p).await?,
        None => registry.default_profile().await?,
    })
}

async fn list_profiles(app: &App) -> Result<()> {
    for profile in app.executor.profiles().list().await? {
        let mut flags = Vec::new();
        if profile.is_system {
            flags.push("system");
        }
        if profile.is_default {
            flags.push("default");
        }
        println!(
            "{}  {:<16} {:<10} {}",
            profile.id,
            profile.name,
            profile.container.name(),
            if flags.is_empty() {
                String::new()
            } else {
                format!("[{}]", flags.join(", "))
            }
        );
    }
    Ok(())
}

async fn probe_file(app: &App, file: &Path, json: bool) -> Result<()> {
    let analysis = app.analyzer.analyze(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("File: {}", analysis.path.display());
    println!("Container: {}", analysis.format_name);
    println!("Size: {} bytes", analysis.file_size);
    let secs = analysis.duration_secs as u64;
    println!(
        "Duration: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );

    println!("\nVideo Streams: {}", analysis.video_streams.len());
    for v in &analysis.video_streams {
        print!("  [{}] {} {}x{}", v.index, v.codec, v.width, v.height);
        if let Some(fps) = v.frame_rate {
            print!(", {fps:.3} fps");
        }
        if let Some(bits) = v.bit_depth {
            print!(", {bits} bit");
        }
        if v.hdr_format.is_hdr() {
            print!(" [{}]", v.hdr_format);
        }
        println!();
    }

    println!("\nAudio Streams: {}", analysis.audio_streams.len());
    for a in &analysis.audio_streams {
        print!("  [{}] {} {}ch", a.index, a.codec, a.channels);
        if let Some(ref lang) = a.language {
            print!(" ({lang})");
        }
        if a.default {
            print!(" [default]");
        }
        println!();
    }

    println!("\nSubtitle Streams: {}", analysis.subtitle_streams.len());
    for s in &analysis.subtitle_streams {
        print!("  [{}] {}", s.index, s.codec);
        if let Some(ref lang) = s.language {
            print!(" ({lang})");
        }
        if s.forced {
            print!(" [forced]");
        }
        println!();
    }

    Ok(())
}

async fn plan(app: &App, input: &Path, profile: Option<&str>) -> Result<()> {
    let profile = resolve_profile(app, profile).await?;
    profile.validate().into_result()?;
    let analysis = app.analyzer.analyze(input).await?;

    println!("Profile: {} ({})", profile.name, profile.container.name());
    for r in plan_renditions(&profile, &analysis) {
        println!("  rendition {}: {} -> {:?}", r.index, r.output.name, r.decision);
    }

    let defs = TaskSplitter.split(&profile, &analysis);
    let mut total = 0.0;
    println!("\nTasks:");
    for (i, def) in defs.iter().enumerate() {
        total += def.weight;
        print!("  {i}. {} weight {:.3}", def.task_type, def.weight);
        if !def.depends_on.is_empty() {
            print!(" after {:?}", def.depends_on);
        }
        println!();
    }

    let estimate = estimate_encoding_time(total, app.config.executor.hardware_speed_factor);
    println!("\nTotal weight: {total:.3}");
    println!("Estimated time: {:.0}s", estimate.as_secs_f64());
    Ok(())
}

async fn print_command(
    app: &App,
    input: &Path,
    output: &Path,
    profile: Option<&str>,
) -> Result<()> {
    let profile = resolve_profile(app, profile).await?;
    let analysis = app.analyzer.analyze(input).await?;
    let accelerators = if profile.options.hardware_acceleration {
        app.hardware.discover().await
    } else {
        Vec::new()
    };
    let command = CommandSynthesizer::new(accelerators).synthesize(input, output, &profile, &analysis)?;
    println!("ffmpeg {command}");
    Ok(())
}

async fn run(app: &App, input: &Path, output_folder: &Path, profile: Option<&str>) -> Result<()> {
    let recovered = app.executor.recover_interrupted().await?;
    if recovered > 0 {
        println!("Marked {recovered} interrupted job(s) as failed");
    }

    let profile = resolve_profile(app, profile).await?;
    let job = app
        .executor
        .create_job(input, output_folder, profile.id)
        .await?;
    println!("Job {} queued with profile {}", job.id, profile.name);

    execute(app, job.id).await
}

/// Execute a queued job, printing progress and cancelling on Ctrl-C.
async fn execute(app: &App, job_id: JobId) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; cancelling job");
                cancel.cancel();
            }
        })
    };

    let mut events = app.events.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event.payload),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let completed = app.executor.execute_job(job_id, cancel).await;
    interrupt.abort();
    printer.abort();

    let status = app.executor.get_job_status(job_id).await?;
    print_status(&status);
    if completed? {
        Ok(())
    } else {
        Err(anyhow!("job {job_id} ended {}", status.job.state))
    }
}

fn print_event(payload: &EventPayload) {
    match payload {
        EventPayload::TaskProgress {
            task_id,
            percentage,
            fps,
            speed,
            eta_secs,
            ..
        } => {
            let eta = eta_secs.map(|e| format!("{e:.0}s")).unwrap_or_else(|| "?".into());
            println!("  {task_id} {percentage:5.1}%  {fps:.1} fps  {speed:.2}x  eta {eta}");
        }
        EventPayload::TaskStateChanged {
            task_id,
            state,
            error,
            ..
        } => match error {
            Some(error) => println!("  task {task_id} {state}: {error}"),
            None => println!("  task {task_id} {state}"),
        },
        EventPayload::JobStateChanged { job_id, state, .. } => {
            println!("job {job_id} {state}");
        }
    }
}

fn print_status(status: &JobStatus) {
    let job = &status.job;
    println!("Job: {}", job.id);
    println!("State: {}", job.state);
    println!("Input: {}", job.input_path.display());
    println!("Output: {}", job.output_folder.display());
    println!("Progress: {:.1}%", status.percentage);
    if let Some(eta) = status.eta_secs {
        println!("ETA: {eta:.0}s");
    }
    println!("Estimate: {:.0}s (weight {:.3})", status.estimated_secs, job.weight);
    if let Some(ms) = job.execution_time_ms {
        println!("Execution time: {:.1}s", ms as f64 / 1000.0);
    }
    if let Some(ref error) = job.error_message {
        println!("Error: {error}");
    }
    if let Some(retry_of) = job.retry_of {
        println!("Retry of: {retry_of}");
    }
    println!("Tasks:");
    for task in &status.tasks {
        print!(
            "  {}. {} {} (retries {}/{})",
            task.sequence, task.task_type, task.state, task.retry_count, task.max_retries
        );
        if let Some(ref error) = task.error_message {
            print!(" - {}", error.lines().last().unwrap_or_default());
        }
        println!();
    }
}

async fn list_jobs(app: &App, state: Option<&str>) -> Result<()> {
    let state: Option<JobState> = state
        .map(|s| s.parse().map_err(|e| anyhow!("invalid state {s:?}: {e}")))
        .transpose()?;
    for job in app.executor.list_jobs(state).await? {
        println!(
            "{}  {:<10} {}  {}",
            job.id,
            job.state.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.input_path.display()
        );
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ef_av::ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        Err(anyhow!("some tools are missing; install ffmpeg and ffprobe"))
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration parsed");
    println!("  Database: {}", config.storage.db_path.display());
    println!(
        "  Strategy: {} (max {} parallel tasks)",
        config.executor.strategy, config.executor.max_parallel_tasks
    );
    println!("  Node: {}", config.executor.node_name);
    println!("  Hardware acceleration: {}", config.hardware.enabled);

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ! {warning}");
    }
    Ok(())
}
