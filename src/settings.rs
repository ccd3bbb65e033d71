use anyhow::{Context, Result};
use maple_bot::BotConfig;
use maple_capture::PixelRegion;
use maple_vision::VisionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_SETTINGS: &str = "auto_maple.json";

/// Which screen area to capture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Monitor index in enumeration order
    pub monitor: usize,
    /// Game window area on that monitor; the whole monitor when absent
    pub region: Option<PixelRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub vision: VisionConfig,
    pub bot: BotConfig,
    pub assets_dir: PathBuf,
    /// Routine file to run; the bot idles without one
    pub routine: Option<PathBuf>,
    pub start_enabled: bool,
    pub record_layout: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            vision: VisionConfig::default(),
            bot: BotConfig::default(),
            assets_dir: PathBuf::from("assets"),
            routine: None,
            start_enabled: false,
            record_layout: false,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file gives the defaults; a file
    /// that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}
