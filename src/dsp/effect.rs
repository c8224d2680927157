//! Per-frame spectral effect: PCM → spectrum → mask → resynthesis → PCM.
//!
//! ```text
//! PcmFrame (L samples)
//!   → normalise / 32768, zero-pad to N₁      (analysis buffer)
//!   → forward FFT
//!   → mask bins 0..=N₁/2 and their mirrors
//!   → copy into N₂ buffer, zero-pad         (synthesis buffer)
//!   → inverse FFT, / N₂
//!   → clamp, × 32768, round, saturate
//! PcmFrame (L samples)
//! ```
//!
//! When `N₂ ≠ N₁` the spectrum is re-read on a different time base, which
//! stretches (N₂ > N₁) or compresses the first `L` output samples.

use std::sync::Arc;

use thiserror::Error;

use super::fft::{ComplexBuffer, Direction, TransformError};
use super::mask::SpectralMask;
use crate::audio::pcm::{normalize, quantize, PcmFrame};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// EffectError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("invalid transform size: {0}")]
    Transform(#[from] TransformError),

    #[error("frame length must be at least 1 sample")]
    EmptyFrameLength,

    #[error("frame length {frame_len} exceeds the {transform} transform size {size}")]
    FrameExceedsTransform {
        frame_len: usize,
        transform: &'static str,
        size: usize,
    },

    #[error("frame of {got} samples is longer than the configured {max}")]
    FrameTooLong { got: usize, max: usize },
}

// ---------------------------------------------------------------------------
// EffectProcessor
// ---------------------------------------------------------------------------

/// Owns the analysis and synthesis buffers for one processing thread.
///
/// Both buffers are fully rewritten on every [`process`](Self::process) call,
/// so the output depends only on the input frame and the mask.  Create one
/// processor per thread; the mask itself is shared.
pub struct EffectProcessor {
    frame_len: usize,
    analysis: ComplexBuffer,
    synthesis: ComplexBuffer,
    mask: Arc<dyn SpectralMask>,
}

impl std::fmt::Debug for EffectProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectProcessor")
            .field("frame_len", &self.frame_len)
            .field("analysis_size", &self.analysis.len())
            .field("synthesis_size", &self.synthesis.len())
            .finish_non_exhaustive()
    }
}

impl EffectProcessor {
    /// Build a processor for frames of up to `frame_len` samples.
    ///
    /// # Errors
    ///
    /// - [`EffectError::Transform`]: a size is not a power of two ≥ 2.
    /// - [`EffectError::EmptyFrameLength`]: `frame_len == 0`.
    /// - [`EffectError::FrameExceedsTransform`]: `frame_len` is larger than
    ///   either transform.
    pub fn new(
        frame_len: usize,
        analysis_size: usize,
        synthesis_size: usize,
        mask: Arc<dyn SpectralMask>,
    ) -> Result<Self, EffectError> {
        let analysis = ComplexBuffer::zeroed(analysis_size)?;
        let synthesis = ComplexBuffer::zeroed(synthesis_size)?;

        if frame_len == 0 {
            return Err(EffectError::EmptyFrameLength);
        }
        if frame_len > analysis_size {
            return Err(EffectError::FrameExceedsTransform {
                frame_len,
                transform: "analysis",
                size: analysis_size,
            });
        }
        if frame_len > synthesis_size {
            return Err(EffectError::FrameExceedsTransform {
                frame_len,
                transform: "synthesis",
                size: synthesis_size,
            });
        }

        Ok(Self {
            frame_len,
            analysis,
            synthesis,
            mask,
        })
    }

    /// Build from the `audio` and `spectral` config sections.
    pub fn from_config(config: &AppConfig) -> Result<Self, EffectError> {
        let mask = config
            .spectral
            .mask
            .build(config.audio.sample_rate, config.spectral.analysis_size);
        Self::new(
            config.audio.frame_size,
            config.spectral.analysis_size,
            config.spectral.synthesis_size,
            mask,
        )
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn analysis_size(&self) -> usize {
        self.analysis.len()
    }

    pub fn synthesis_size(&self) -> usize {
        self.synthesis.len()
    }

    /// Run one frame through the effect.
    ///
    /// The output has the same number of samples as `frame`.
    ///
    /// # Errors
    ///
    /// [`EffectError::FrameTooLong`] when `frame` holds more samples than the
    /// configured frame length.
    pub fn process(&mut self, frame: &PcmFrame) -> Result<PcmFrame, EffectError> {
        if frame.len() > self.frame_len {
            return Err(EffectError::FrameTooLong {
                got: frame.len(),
                max: self.frame_len,
            });
        }

        self.load(frame);
        self.analysis.transform(Direction::Forward);
        self.apply_mask();
        self.resynthesize();

        Ok(PcmFrame::new(
            self.synthesis[..frame.len()]
                .iter()
                .map(|c| quantize(c.re))
                .collect(),
        ))
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn load(&mut self, frame: &PcmFrame) {
        self.analysis.clear();
        for (slot, &sample) in self.analysis.iter_mut().zip(frame.samples()) {
            slot.re = normalize(sample);
        }
    }

    /// Bins `0` and `N/2` have no mirror; every other bin `k` shares its
    /// gain with `N - k`.
    fn apply_mask(&mut self) {
        let n = self.analysis.len();
        let half = n / 2;

        for k in 0..=half {
            let gain = self.mask.policy(k).gain();
            if gain == 1.0 {
                continue;
            }
            self.analysis[k] *= gain;
            if k != 0 && k != half {
                self.analysis[n - k] *= gain;
            }
        }
    }

    fn resynthesize(&mut self) {
        let shared = self.analysis.len().min(self.synthesis.len());
        self.synthesis.clear();
        self.synthesis[..shared].copy_from_slice(&self.analysis[..shared]);

        self.synthesis.transform(Direction::Inverse);
        let n = self.synthesis.len() as f64;
        self.synthesis.scale(1.0 / n);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
