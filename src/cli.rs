use clap::{Parser, Subcommand, ValueEnum};
use ef_core::config::StrategyKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "encodeforge")]
#[command(author, version, about = "Profile-driven media transcoding orchestrator")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Sequential,
    Dependency,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::Dependency => StrategyKind::Dependency,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List system and user encoding profiles
    Profiles,

    /// Show one profile as JSON
    ShowProfile {
        /// Profile id or name
        profile: String,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tasks, weights and time estimate a job would get
    Plan {
        /// Source file
        input: PathBuf,

        /// Profile id or name (defaults to the default profile)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Print the ffmpeg command a profile produces for a file
    Command {
        /// Source file
        input: PathBuf,

        /// Output file (or playlist for HLS)
        output: PathBuf,

        /// Profile id or name (defaults to the default profile)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Create a job and run it to completion
    Run {
        /// Source file
        input: PathBuf,

        /// Folder receiving every output of the job
        output_folder: PathBuf,

        /// Profile id or name (defaults to the default profile)
        #[arg(short, long)]
        profile: Option<String>,

        /// Override the configured scheduling strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// List jobs
    Jobs {
        /// Only jobs in this state (queued, processing, completed, failed, cancelled)
        #[arg(long)]
        state: Option<String>,
    },

    /// Show a job's state and progress
    Status {
        job_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel a queued or processing job
    Cancel { job_id: String },

    /// Queue a retry of a failed job
    Retry {
        job_id: String,

        /// Run the retry right away
        #[arg(long)]
        run: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    ValidateConfig {
        /// Config file to validate (uses --config if not specified)
        config: Option<PathBuf>,
    },
}
