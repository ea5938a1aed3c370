//! Benchmark configuration: file, then command-line overrides.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use opusbench_core::{Error, Result, StartSignal};
use opusbench_decode::{EngineSettings, DEFAULT_SCRATCH_FRAMES};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.json";

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// File to decode.
    pub file: Option<PathBuf>,
    /// Scratch buffer capacity in frames per channel.
    pub scratch_frames: usize,
    /// Tick rate while not decoding.
    pub idle_fps: u32,
    /// How many times to run the signal list.
    pub repeat: u32,
    /// Start signals fed to the engine, in order.
    pub signals: Vec<StartSignal>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            file: None,
            scratch_frames: DEFAULT_SCRATCH_FRAMES,
            idle_fps: 30,
            repeat: 1,
            signals: vec![StartSignal::Memory, StartSignal::Stream],
        }
    }
}

impl BenchConfig {
    /// Load from `path`, or from the platform config directory if `path` is None.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scratch_frames == 0 {
            return Err(Error::Config("scratch_frames must be at least 1".into()));
        }
        if self.idle_fps == 0 {
            return Err(Error::Config("idle_fps must be at least 1".into()));
        }
        if self.signals.is_empty() {
            return Err(Error::Config("no start signals given".into()));
        }
        if self.file.is_none() {
            return Err(Error::Config("no input file given".into()));
        }
        if self.repeat == 0 {
            return Err(Error::Config("repeat must be at least 1".into()));
        }
        Ok(())
    }

    /// The full signal queue: `signals` repeated `repeat` times, produced lazily.
    pub fn schedule(&self) -> impl Iterator<Item = StartSignal> + '_ {
        let len = self.signals.len().saturating_mul(self.repeat as usize);
        self.signals.iter().copied().cycle().take(len)
    }

    /// Engine settings for a validated config.
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let file = self
            .file
            .clone()
            .ok_or_else(|| Error::Config("no input file given".into()))?;
        let mut settings = EngineSettings::new(file);
        settings.scratch_frames = self.scratch_frames;
        settings.idle_fps = self.idle_fps;
        Ok(settings)
    }
}

fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "opusbench", "opusbench")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
