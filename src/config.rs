use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::render_drawing::{DrawConfig, VisualStyle};
use crate::spectrum::AnalyserConfig;

/// Looked up in the working directory when `--config` isn't given.
pub const DEFAULT_CONFIG_FILE: &str = "soundscape.toml";

#[derive(Parser, Debug, Default)]
#[command(name = "soundscape", version, about = "Audio player with a live spectrum visualizer")]
pub struct Cli {
    /// Audio file to open on start
    pub file: Option<PathBuf>,

    /// Visualization style
    #[arg(long, value_enum)]
    pub style: Option<VisualStyle>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Initial volume, 0.0 to 1.0
    #[arg(long)]
    pub volume: Option<f32>,

    /// Write logs to this directory as well as stderr
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub file_output: bool,
    pub directory: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            file_output: false,
            directory: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowConfig,
    pub analyser: AnalyserConfig,
    pub draw: DrawConfig,
    pub volume: f32,
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            window: WindowConfig::default(),
            analyser: AnalyserConfig::default(),
            draw: DrawConfig::default(),
            volume: 1.0,
            log: LogConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()
    }

    /// Reads `path`, or the default config file when `path` is `None`. A
    /// missing default file just means defaults; a missing explicit one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    fn validate(mut self) -> Result<Self> {
        self.analyser = self.analyser.validate()?;
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::Config(format!(
                "volume must be in 0..=1, got {}",
                self.volume
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config("window size must be non-zero".into()));
        }
        self.draw.bar_gap = self.draw.bar_gap.max(0.0);
        Ok(self)
    }

    /// Command-line flags win over the config file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(style) = cli.style {
            self.draw.style = style;
        }
        if let Some(volume) = cli.volume {
            self.volume = if volume.is_nan() {
                0.0
            } else {
                volume.clamp(0.0, 1.0)
            };
        }
        if let Some(dir) = &cli.log_dir {
            self.log.directory = dir.clone();
            self.log.file_output = true;
        }
    }
}
