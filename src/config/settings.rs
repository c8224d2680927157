//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::dsp::{validate_size, MaskSpec, TransformError};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting that the pipeline cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("audio.sample_rate must be positive")]
    ZeroSampleRate,

    #[error("audio.bits_per_sample must be 16, got {0}")]
    UnsupportedBitDepth(u16),

    #[error("audio.channels must be 1 (mono), got {0}")]
    UnsupportedChannels(u16),

    #[error("spectral.{field}: {source}")]
    TransformSize {
        field: &'static str,
        #[source]
        source: TransformError,
    },

    #[error("audio.frame_size {frame_size} must be in 1..={max} (the smaller transform size)")]
    FrameSize { frame_size: usize, max: usize },

    #[error("{0} must be positive")]
    Zero(&'static str),

    #[error("playback.buffer_bytes must be a positive multiple of 4, got {0}")]
    PlaybackBuffer(usize),

    #[error("spectral.mask: {0}")]
    Mask(String),

    #[error("hotkey.stop_key: unknown key {0:?}")]
    UnknownKey(String),
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// PCM format of the processing path and device selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Pipeline sample rate in Hz; devices are resampled to and from it.
    pub sample_rate: u32,
    /// Sample width of the stream log; only 16 is supported.
    pub bits_per_sample: u16,
    /// Channel count of the processing path; only mono is supported.
    pub channels: u16,
    /// Samples per captured frame (one eighth of a second by default).
    pub frame_size: usize,
    /// How long the capture loop waits for a frame before re-checking for
    /// cancellation.
    pub capture_poll_ms: u64,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32_768,
            bits_per_sample: 16,
            channels: 1,
            frame_size: 4_096,
            capture_poll_ms: 250,
            input_device: None,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralConfig
// ---------------------------------------------------------------------------

/// FFT sizes and the masking function applied to each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Forward transform size N₁ (power of two).
    pub analysis_size: usize,
    /// Inverse transform size N₂ (power of two).
    pub synthesis_size: usize,
    pub mask: MaskSpec,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            analysis_size: 16_384,
            synthesis_size: 32_768,
            mask: MaskSpec::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Limits of the multiplexed byte log between capture and playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum number of concurrently registered readers.
    pub max_readers: usize,
    /// Longest a single read waits for new data.
    pub read_timeout_ms: u64,
    /// Consecutive read timeouts the feeder tolerates before giving up.
    pub max_read_retries: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_readers: 16,
            read_timeout_ms: 30_000,
            max_read_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Output buffer geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Device buffer size in bytes; refilled half at a time.
    pub buffer_bytes: usize,
    /// Longest the feeder waits for a half-buffer notification.
    pub refill_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: 32_768,
            refill_timeout_ms: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global key bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Key that ends the session (e.g. `"Escape"`, `"F9"`).
    pub stop_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            stop_key: "Escape".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_fx::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub spectral: SpectralConfig,
    pub stream: StreamConfig,
    pub playback: PlaybackConfig,
    pub hotkey: HotkeyConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every setting the pipeline depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if audio.bits_per_sample != 16 {
            return Err(ConfigError::UnsupportedBitDepth(audio.bits_per_sample));
        }
        if audio.channels != 1 {
            return Err(ConfigError::UnsupportedChannels(audio.channels));
        }

        let spectral = &self.spectral;
        for (field, size) in [
            ("analysis_size", spectral.analysis_size),
            ("synthesis_size", spectral.synthesis_size),
        ] {
            validate_size(size).map_err(|source| ConfigError::TransformSize { field, source })?;
        }
        let max = spectral.analysis_size.min(spectral.synthesis_size);
        if audio.frame_size == 0 || audio.frame_size > max {
            return Err(ConfigError::FrameSize {
                frame_size: audio.frame_size,
                max,
            });
        }
        self.validate_mask()?;

        for (name, value) in [
            ("audio.capture_poll_ms", audio.capture_poll_ms),
            ("stream.read_timeout_ms", self.stream.read_timeout_ms),
            ("playback.refill_timeout_ms", self.playback.refill_timeout_ms),
            ("stream.max_readers", self.stream.max_readers as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        let buffer = self.playback.buffer_bytes;
        if buffer == 0 || buffer % 4 != 0 {
            return Err(ConfigError::PlaybackBuffer(buffer));
        }

        if crate::hotkey::parse_key(&self.hotkey.stop_key).is_none() {
            return Err(ConfigError::UnknownKey(self.hotkey.stop_key.clone()));
        }
        Ok(())
    }

    fn validate_mask(&self) -> Result<(), ConfigError> {
        let nyquist = self.audio.sample_rate as f64 / 2.0;
        let in_band = |hz: f64| hz.is_finite() && (0.0..=nyquist).contains(&hz);

        match self.spectral.mask {
            MaskSpec::PassThrough => Ok(()),
            MaskSpec::LowPass { cutoff_hz } | MaskSpec::HighPass { cutoff_hz } => {
                if in_band(cutoff_hz) {
                    Ok(())
                } else {
                    Err(ConfigError::Mask(format!(
                        "cutoff_hz {cutoff_hz} outside 0..={nyquist}"
                    )))
                }
            }
            MaskSpec::BandStop {
                low_hz,
                high_hz,
                gain,
            } => {
                if !in_band(low_hz) || !in_band(high_hz) || low_hz > high_hz {
                    Err(ConfigError::Mask(format!(
                        "band {low_hz}..{high_hz} Hz must be ordered and within 0..={nyquist}"
                    )))
                } else if !(0.0..=1.0).contains(&gain) {
                    Err(ConfigError::Mask(format!("gain {gain} outside 0..=1")))
                } else {
                    Ok(())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A default `AppConfig` survives a TOML round trip unchanged.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn defaults_describe_32k_mono_pipeline() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.sample_rate, 32_768);
        assert_eq!(cfg.audio.bits_per_sample, 16);
        assert_eq!(cfg.audio.channels, 1);
        // 1 s capture buffer split into 8 notifications.
        assert_eq!(cfg.audio.frame_size, cfg.audio.sample_rate as usize / 8);
        assert_eq!(cfg.spectral.analysis_size, 16_384);
        assert_eq!(cfg.spectral.synthesis_size, 32_768);
        // Half a second of 16-bit mono.
        assert_eq!(cfg.playback.buffer_bytes, cfg.audio.sample_rate as usize);
        assert_eq!(cfg.stream.read_timeout_ms, 30_000);
        assert_eq!(cfg.hotkey.stop_key, "Escape");
        assert_eq!(cfg.spectral.mask, MaskSpec::PassThrough);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.frame_size = 2_048;
        cfg.audio.input_device = Some("USB Mic".into());
        cfg.spectral.mask = MaskSpec::HighPass { cutoff_hz: 300.0 };
        cfg.stream.max_readers = 2;
        cfg.hotkey.stop_key = "F10".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[spectral]\nsynthesis_size = 16384\n").unwrap();

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.spectral.synthesis_size, 16_384);
        assert_eq!(loaded.spectral.analysis_size, 16_384);
        assert_eq!(loaded.audio, AudioConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[audio\nsample_rate = ").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    // ---- validate ----------------------------------------------------------

    #[test]
    fn non_power_of_two_transform_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.spectral.analysis_size = 12_000;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::TransformSize {
                field: "analysis_size",
                source: TransformError::NotPowerOfTwo(12_000),
            })
        );
    }

    #[test]
    fn frame_larger_than_transform_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.audio.frame_size = 20_000;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::FrameSize {
                frame_size: 20_000,
                max: 16_384
            })
        );
    }

    #[test]
    fn format_must_be_16_bit_mono() {
        let mut cfg = AppConfig::default();
        cfg.audio.channels = 2;
        assert_eq!(cfg.validate(), Err(ConfigError::UnsupportedChannels(2)));

        let mut cfg = AppConfig::default();
        cfg.audio.bits_per_sample = 8;
        assert_eq!(cfg.validate(), Err(ConfigError::UnsupportedBitDepth(8)));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.stream.max_readers = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::Zero("stream.max_readers")));

        let mut cfg = AppConfig::default();
        cfg.playback.buffer_bytes = 30;
        assert_eq!(cfg.validate(), Err(ConfigError::PlaybackBuffer(30)));
    }

    #[test]
    fn mask_bounds_are_checked() {
        let mut cfg = AppConfig::default();
        cfg.spectral.mask = MaskSpec::LowPass { cutoff_hz: 20_000.0 };
        assert!(matches!(cfg.validate(), Err(ConfigError::Mask(_))));

        cfg.spectral.mask = MaskSpec::BandStop {
            low_hz: 60.0,
            high_hz: 50.0,
            gain: 0.0,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Mask(_))));

        cfg.spectral.mask = MaskSpec::BandStop {
            low_hz: 50.0,
            high_hz: 60.0,
            gain: 0.2,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_stop_key_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.hotkey.stop_key = "Hyper".into();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownKey("Hyper".into()))
        );
    }
}
