//! Application wiring.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ef_av::tools::{FFMPEG, FFPROBE};
use ef_av::{discovery_from_config, FfmpegRunner, FfprobeAnalyzer, HardwareDiscovery, ToolRegistry};
use ef_core::config::Config;
use ef_core::events::EventBus;
use ef_core::Result;
use ef_db::{SqliteStore, Store};
use ef_pipeline::JobExecutor;
use ef_probe::StreamAnalyzer;

/// Everything a command needs, built once from [`Config`].
pub struct App {
    pub config: Config,
    pub tools: ToolRegistry,
    pub store: Arc<SqliteStore>,
    pub events: Arc<EventBus>,
    pub analyzer: Arc<dyn StreamAnalyzer>,
    pub hardware: Arc<dyn HardwareDiscovery>,
    pub executor: JobExecutor,
}

/// A discovered tool path, or the bare name so that spawning reports the
/// missing binary only when a command actually needs it.
fn tool_path(tools: &ToolRegistry, name: &str) -> PathBuf {
    tools
        .path(name)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(name))
}

impl App {
    /// Discover tools and open (creating and migrating) the database.
    pub fn open(config: Config) -> Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        for missing in tools.check_all().iter().filter(|t| !t.available) {
            tracing::warn!(tool = %missing.name, "Tool not found; commands needing it will fail");
        }

        tracing::debug!(path = %config.storage.db_path.display(), "Opening database");
        let store = Arc::new(SqliteStore::open(&config.storage.db_path)?);
        Ok(Self::with_store(config, tools, store))
    }

    pub fn with_store(config: Config, tools: ToolRegistry, store: Arc<SqliteStore>) -> Self {
        let events = Arc::new(EventBus::default());
        let analyzer: Arc<dyn StreamAnalyzer> =
            Arc::new(FfprobeAnalyzer::new(tool_path(&tools, FFPROBE)));
        let runner = Arc::new(FfmpegRunner::new(tool_path(&tools, FFMPEG)));
        let hardware = discovery_from_config(&config.hardware, &tools);

        let executor = JobExecutor::new(store.clone() as Arc<dyn Store>, analyzer.clone(), runner)
            .with_config(config.executor.clone())
            .with_hardware(hardware.clone())
            .with_sink(events.clone());

        Self {
            config,
            tools,
            store,
            events,
            analyzer,
            hardware,
            executor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_database_under_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("nested").join("ef.db");
        config.hardware.enabled = false;

        let app = App::open(config).unwrap();
        assert!(app.config.storage.db_path.exists());
        assert_eq!(app.executor.strategy().name(), "sequential");
    }

    #[test]
    fn missing_tools_fall_back_to_bare_names() {
        let tools = ToolRegistry::default();
        assert_eq!(tool_path(&tools, FFMPEG), PathBuf::from("ffmpeg"));
    }
}
