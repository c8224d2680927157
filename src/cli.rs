//! Command-line argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::config::{AppConfig, AppPaths};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "voice-fx")]
#[command(about = "Real-time spectral voice effect: microphone → FFT mask → speaker", long_about = None)]
pub struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    pub write_config: bool,

    /// Stop automatically after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub seconds: Option<f32>,

    /// List audio input and output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Path of the settings file to read and write.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppPaths::new().settings_file)
    }

    /// Load settings from [`config_path`](Self::config_path).
    pub fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load_from(&self.config_path())
    }

    /// Auto-stop duration, ignoring values that are not a positive,
    /// representable number of seconds.
    pub fn run_duration(&self) -> Option<Duration> {
        self.seconds
            .and_then(|s| Duration::try_from_secs_f32(s).ok())
            .filter(|d| !d.is_zero())
    }
}
