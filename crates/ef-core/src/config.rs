//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool, storage, executor and hardware sections. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
    pub executor: ExecutorConfig,
    pub hardware: HardwareConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.executor.max_parallel_tasks == 0 {
            warnings.push("executor.max_parallel_tasks is 0; treating it as 1".into());
        }
        if self.executor.max_parallel_tasks > 1
            && self.executor.strategy == StrategyKind::Sequential
        {
            warnings.push(
                "executor.max_parallel_tasks only applies to the dependency strategy".into(),
            );
        }
        if self.executor.progress_interval_ms == 0 {
            warnings.push("executor.progress_interval_ms is 0; progress will not be throttled".into());
        }
        if self.executor.hardware_speed_factor <= 0.0 {
            warnings.push(format!(
                "executor.hardware_speed_factor {} must be positive; 1.0 will be used",
                self.executor.hardware_speed_factor
            ));
        }
        if self.executor.node_name.trim().is_empty() {
            warnings.push("executor.node_name is empty".into());
        }

        let valid = ["cuda", "qsv", "vaapi", "videotoolbox"];
        for accel in &self.hardware.accelerators {
            if !valid.contains(&accel.as_str()) {
                warnings.push(format!(
                    "hardware accelerator '{}' is not recognized (valid: {})",
                    accel,
                    valid.join(", ")
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools. `None` means "look it up on `PATH`".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Durable storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/encodeforge.db"),
        }
    }
}

/// Which task scheduling strategy the executor uses within one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Run tasks one at a time in list order.
    #[default]
    Sequential,
    /// Run any task whose prerequisites have completed, up to
    /// `max_parallel_tasks` at once.
    Dependency,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

/// Job executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub strategy: StrategyKind,
    pub max_parallel_tasks: usize,
    /// Minimum gap between progress broadcasts per task.
    pub progress_interval_ms: u64,
    /// Recorded as the assigned node of every task this process runs.
    pub node_name: String,
    /// Retry budget stamped onto newly created tasks.
    pub default_max_retries: u32,
    /// Relative speed of this machine versus the reference hardware.
    pub hardware_speed_factor: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Sequential,
            max_parallel_tasks: 2,
            progress_interval_ms: 500,
            node_name: "local".into(),
            default_max_retries: 3,
            hardware_speed_factor: 1.0,
        }
    }
}

/// Hardware acceleration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Master switch; profiles must also opt in.
    pub enabled: bool,
    /// Query `ffmpeg -hwaccels` at execution time.
    pub detect: bool,
    /// Static accelerator list used when detection is off.
    pub accelerators: Vec<String>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detect: true,
            accelerators: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.executor.strategy, StrategyKind::Sequential);
        assert_eq!(cfg.executor.progress_interval_ms, 500);
        assert_eq!(cfg.executor.default_max_retries, 3);
        assert_eq!(cfg.storage.db_path, PathBuf::from("./data/encodeforge.db"));
        assert!(cfg.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"executor": {"strategy": "dependency", "max_parallel_tasks": 4}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.executor.strategy, StrategyKind::Dependency);
        assert_eq!(cfg.executor.max_parallel_tasks, 4);
        assert_eq!(cfg.executor.progress_interval_ms, 500);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert!(cfg.hardware.enabled);
        assert_eq!(cfg.executor.node_name, "local");
    }

    #[test]
    fn parse_error_is_validation() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(cfg.executor.max_parallel_tasks, 2);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tools": {"ffmpeg_path": "/opt/ffmpeg"}}"#).unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.tools.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
    }

    #[test]
    fn unknown_accelerator_warns() {
        let mut cfg = Config::default();
        cfg.hardware.accelerators = vec!["cuda".into(), "opencl".into()];
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("opencl"));
    }

    #[test]
    fn non_positive_speed_factor_warns() {
        let mut cfg = Config::default();
        cfg.executor.hardware_speed_factor = 0.0;
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.contains("hardware_speed_factor")));
    }
}
