// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Settings are read once at startup (file, then command-line overrides) and
// passed by reference into bootstrap. Nothing mutates them mid-session.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub assets: AssetConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Example".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub vsync: bool,
    pub multisampling: bool,
    pub sample_count: u32,
    pub max_frames_in_flight: usize,
    pub clear_color: [f32; 4],
    /// Fraction of the animation timer advanced per second
    pub timer_speed: f32,
    /// Explicit GPU index; `None` lets bootstrap pick
    pub gpu: Option<usize>,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: false,
            multisampling: true,
            sample_count: 4,
            max_frames_in_flight: 2,
            clear_color: [0.025, 0.025, 0.025, 1.0],
            timer_speed: 0.25,
            gpu: None,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: false,
            log_to_file: false,
            log_file: "vulkan_debug.log".to_string(),
            show_fps: true,
        }
    }
}

/// Where demo resources live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub shader_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

/// Command-line overrides, applied on top of the config file
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,
    /// Enable Vulkan validation layers
    #[arg(long)]
    pub validation: bool,
    /// Enable vertical sync
    #[arg(long)]
    pub vsync: bool,
    /// Start fullscreen
    #[arg(long)]
    pub fullscreen: bool,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Multisample count (1 disables multisampling)
    #[arg(long)]
    pub samples: Option<u32>,
    /// Disable multisampling
    #[arg(long)]
    pub no_msaa: bool,
    /// Select GPU by index
    #[arg(long)]
    pub gpu: Option<usize>,
    /// Log every available GPU and exit
    #[arg(long)]
    pub list_gpus: bool,
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_path(path).unwrap_or_else(|e| {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the final settings: config file, then command-line flags.
    ///
    /// This runs before logging is initialized, so a file that fails to load
    /// is handed back for the caller to report once it can. Defaults stand in
    /// for its contents.
    pub fn from_args(args: &Args) -> (Self, Option<anyhow::Error>) {
        let (mut config, error) = match Self::load_from_path(&args.config) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        };
        config.apply_args(args);
        (config, error)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if args.validation {
            self.debug.validation_layers = true;
        }
        if args.vsync {
            self.graphics.vsync = true;
        }
        if args.fullscreen {
            self.window.fullscreen = true;
        }
        if let Some(width) = args.width {
            self.window.width = width;
        }
        if let Some(height) = args.height {
            self.window.height = height;
        }
        if let Some(samples) = args.samples {
            self.graphics.sample_count = samples;
            self.graphics.multisampling = samples > 1;
        }
        if args.no_msaa {
            self.graphics.multisampling = false;
        }
        if args.gpu.is_some() {
            self.graphics.gpu = args.gpu;
        }
    }

    /// Requested sample count after the multisampling switch is applied.
    pub fn requested_samples(&self) -> u32 {
        if self.graphics.multisampling {
            self.graphics.sample_count.max(1)
        } else {
            1
        }
    }

    pub fn max_frames_in_flight(&self) -> usize {
        self.graphics.max_frames_in_flight.max(1)
    }
}
