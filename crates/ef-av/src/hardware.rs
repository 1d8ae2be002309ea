//! Hardware acceleration discovery.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ef_command::HardwareAccelerator;
use ef_core::config::HardwareConfig;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFMPEG};

/// Reports the acceleration methods usable on this machine.
#[async_trait]
pub trait HardwareDiscovery: Send + Sync {
    async fn discover(&self) -> Vec<HardwareAccelerator>;
}

/// Asks `ffmpeg -hwaccels`. Failures degrade to no acceleration.
#[derive(Debug, Clone)]
pub struct FfmpegHardwareDiscovery {
    ffmpeg_path: PathBuf,
}

impl FfmpegHardwareDiscovery {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

#[async_trait]
impl HardwareDiscovery for FfmpegHardwareDiscovery {
    async fn discover(&self) -> Vec<HardwareAccelerator> {
        let output = ToolCommand::new(self.ffmpeg_path.clone())
            .args(["-hide_banner", "-hwaccels"])
            .execute()
            .await;
        match output {
            Ok(out) => {
                let found = parse_hwaccels(&out.stdout);
                tracing::debug!(accelerators = ?found.iter().map(|a| &a.kind).collect::<Vec<_>>(), "Discovered hardware acceleration");
                found
            }
            Err(e) => {
                tracing::warn!(error = %e, "Hardware discovery failed; using software decoding");
                Vec::new()
            }
        }
    }
}

/// Parse `ffmpeg -hwaccels` output: a header line followed by one method
/// per line.
pub fn parse_hwaccels(output: &str) -> Vec<HardwareAccelerator> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.ends_with(':'))
        .map(HardwareAccelerator::for_kind)
        .collect()
}

/// A fixed list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticHardwareDiscovery {
    kinds: Vec<String>,
}

impl StaticHardwareDiscovery {
    pub fn new(kinds: Vec<String>) -> Self {
        Self { kinds }
    }
}

#[async_trait]
impl HardwareDiscovery for StaticHardwareDiscovery {
    async fn discover(&self) -> Vec<HardwareAccelerator> {
        self.kinds
            .iter()
            .map(|k| HardwareAccelerator::for_kind(k.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHardware;

#[async_trait]
impl HardwareDiscovery for NoHardware {
    async fn discover(&self) -> Vec<HardwareAccelerator> {
        Vec::new()
    }
}

/// Pick the discovery backend the configuration asks for.
///
/// Disabled hardware yields [`NoHardware`]; a configured list or disabled
/// detection yields [`StaticHardwareDiscovery`]; otherwise ffmpeg is
/// queried when it is installed.
pub fn discovery_from_config(
    config: &HardwareConfig,
    tools: &ToolRegistry,
) -> Arc<dyn HardwareDiscovery> {
    if !config.enabled {
        return Arc::new(NoHardware);
    }
    if !config.accelerators.is_empty() || !config.detect {
        return Arc::new(StaticHardwareDiscovery::new(config.accelerators.clone()));
    }
    match tools.path(FFMPEG) {
        Some(path) => Arc::new(FfmpegHardwareDiscovery::new(path.to_path_buf())),
        None => Arc::new(NoHardware),
    }
}
