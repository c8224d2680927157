//! Frequency-domain masking hooks.
//!
//! A mask decides, for every non-negative frequency bin `0..=N/2`, how much
//! of that bin survives.  The [`EffectProcessor`](super::EffectProcessor)
//! applies the decision to the bin and to its conjugate mirror.
//!
//! Any `Fn(usize) -> BinPolicy + Send + Sync` closure is a mask:
//!
//! ```rust
//! use voice_fx::dsp::{BinPolicy, SpectralMask};
//!
//! let below_100 = |bin: usize| if bin < 100 { BinPolicy::Pass } else { BinPolicy::Zero };
//! assert_eq!(below_100.policy(10), BinPolicy::Pass);
//! assert_eq!(below_100.policy(200), BinPolicy::Zero);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BinPolicy
// ---------------------------------------------------------------------------

/// What happens to one frequency bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinPolicy {
    /// Keep the bin unchanged.
    Pass,
    /// Multiply the bin by the given gain.
    Attenuate(f64),
    /// Drop the bin entirely.
    Zero,
}

impl BinPolicy {
    /// Linear gain applied to the bin's real and imaginary parts.
    pub fn gain(self) -> f64 {
        match self {
            BinPolicy::Pass => 1.0,
            BinPolicy::Attenuate(g) => g,
            BinPolicy::Zero => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralMask
// ---------------------------------------------------------------------------

/// Stateless per-bin retention policy.
///
/// Implementations must be pure: the same `bin` always yields the same
/// policy.  They are shared between threads behind an `Arc`.
pub trait SpectralMask: Send + Sync {
    /// Policy for frequency bin `bin` (`0..=N/2`).
    fn policy(&self, bin: usize) -> BinPolicy;
}

impl<F> SpectralMask for F
where
    F: Fn(usize) -> BinPolicy + Send + Sync,
{
    fn policy(&self, bin: usize) -> BinPolicy {
        self(bin)
    }
}

// ---------------------------------------------------------------------------
// Built-in masks
// ---------------------------------------------------------------------------

/// Keeps every bin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SpectralMask for PassThrough {
    fn policy(&self, _bin: usize) -> BinPolicy {
        BinPolicy::Pass
    }
}

/// Zeroes every bin above `cutoff_bin`.
#[derive(Debug, Clone, Copy)]
pub struct LowPass {
    pub cutoff_bin: usize,
}

impl SpectralMask for LowPass {
    fn policy(&self, bin: usize) -> BinPolicy {
        if bin <= self.cutoff_bin {
            BinPolicy::Pass
        } else {
            BinPolicy::Zero
        }
    }
}

/// Zeroes every bin below `cutoff_bin` (DC included).
#[derive(Debug, Clone, Copy)]
pub struct HighPass {
    pub cutoff_bin: usize,
}

impl SpectralMask for HighPass {
    fn policy(&self, bin: usize) -> BinPolicy {
        if bin >= self.cutoff_bin {
            BinPolicy::Pass
        } else {
            BinPolicy::Zero
        }
    }
}

/// Scales bins in `low_bin..=high_bin` by `gain`.
#[derive(Debug, Clone, Copy)]
pub struct BandStop {
    pub low_bin: usize,
    pub high_bin: usize,
    pub gain: f64,
}

impl SpectralMask for BandStop {
    fn policy(&self, bin: usize) -> BinPolicy {
        if (self.low_bin..=self.high_bin).contains(&bin) {
            if self.gain == 0.0 {
                BinPolicy::Zero
            } else {
                BinPolicy::Attenuate(self.gain)
            }
        } else {
            BinPolicy::Pass
        }
    }
}

// ---------------------------------------------------------------------------
// MaskSpec  (configuration form)
// ---------------------------------------------------------------------------

/// Serializable mask description used in `settings.toml`.
///
/// Frequencies are given in Hz and mapped to bins of the analysis transform
/// by [`MaskSpec::build`].
///
/// ```toml
/// [spectral.mask]
/// kind = "low_pass"
/// cutoff_hz = 3400.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskSpec {
    #[default]
    PassThrough,
    LowPass { cutoff_hz: f64 },
    HighPass { cutoff_hz: f64 },
    BandStop { low_hz: f64, high_hz: f64, gain: f64 },
}

impl MaskSpec {
    /// Instantiate the mask for an analysis transform of `analysis_size`
    /// bins running at `sample_rate` Hz.
    pub fn build(&self, sample_rate: u32, analysis_size: usize) -> Arc<dyn SpectralMask> {
        let bin = |hz: f64| hz_to_bin(hz, sample_rate, analysis_size);
        match *self {
            MaskSpec::PassThrough => Arc::new(PassThrough),
            MaskSpec::LowPass { cutoff_hz } => Arc::new(LowPass {
                cutoff_bin: bin(cutoff_hz),
            }),
            MaskSpec::HighPass { cutoff_hz } => Arc::new(HighPass {
                cutoff_bin: bin(cutoff_hz),
            }),
            MaskSpec::BandStop {
                low_hz,
                high_hz,
                gain,
            } => Arc::new(BandStop {
                low_bin: bin(low_hz),
                high_bin: bin(high_hz),
                gain,
            }),
        }
    }
}

/// Nearest bin index for `hz`; bin spacing is `sample_rate / size` Hz.
pub fn hz_to_bin(hz: f64, sample_rate: u32, size: usize) -> usize {
    if sample_rate == 0 || hz <= 0.0 {
        return 0;
    }
    (hz * size as f64 / sample_rate as f64).round() as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_gains() {
        assert_eq!(BinPolicy::Pass.gain(), 1.0);
        assert_eq!(BinPolicy::Zero.gain(), 0.0);
        assert_eq!(BinPolicy::Attenuate(0.25).gain(), 0.25);
    }

    #[test]
    fn low_pass_keeps_cutoff_bin() {
        let mask = LowPass { cutoff_bin: 10 };
        assert_eq!(mask.policy(0), BinPolicy::Pass);
        assert_eq!(mask.policy(10), BinPolicy::Pass);
        assert_eq!(mask.policy(11), BinPolicy::Zero);
    }

    #[test]
    fn high_pass_drops_dc() {
        let mask = HighPass { cutoff_bin: 4 };
        assert_eq!(mask.policy(0), BinPolicy::Zero);
        assert_eq!(mask.policy(3), BinPolicy::Zero);
        assert_eq!(mask.policy(4), BinPolicy::Pass);
    }

    #[test]
    fn band_stop_with_zero_gain_reports_zero() {
        let mask = BandStop {
            low_bin: 5,
            high_bin: 7,
            gain: 0.0,
        };
        assert_eq!(mask.policy(4), BinPolicy::Pass);
        assert_eq!(mask.policy(5), BinPolicy::Zero);
        assert_eq!(mask.policy(7), BinPolicy::Zero);
        assert_eq!(mask.policy(8), BinPolicy::Pass);
    }

    #[test]
    fn band_stop_attenuates() {
        let mask = BandStop {
            low_bin: 1,
            high_bin: 2,
            gain: 0.5,
        };
        assert_eq!(mask.policy(2), BinPolicy::Attenuate(0.5));
    }

    #[test]
    fn closures_are_masks() {
        let odd_only: Arc<dyn SpectralMask> = Arc::new(|bin: usize| {
            if bin % 2 == 1 {
                BinPolicy::Pass
            } else {
                BinPolicy::Zero
            }
        });
        assert_eq!(odd_only.policy(3), BinPolicy::Pass);
        assert_eq!(odd_only.policy(4), BinPolicy::Zero);
    }

    #[test]
    fn hz_maps_to_nearest_bin() {
        // 32768 Hz over 16384 bins = 2 Hz per bin.
        assert_eq!(hz_to_bin(1000.0, 32_768, 16_384), 500);
        assert_eq!(hz_to_bin(1001.2, 32_768, 16_384), 501);
        assert_eq!(hz_to_bin(-5.0, 32_768, 16_384), 0);
        assert_eq!(hz_to_bin(100.0, 0, 16_384), 0);
    }

    #[test]
    fn mask_spec_builds_matching_mask() {
        let mask = MaskSpec::LowPass { cutoff_hz: 1000.0 }.build(32_768, 16_384);
        assert_eq!(mask.policy(500), BinPolicy::Pass);
        assert_eq!(mask.policy(501), BinPolicy::Zero);

        let mask = MaskSpec::default().build(32_768, 16_384);
        assert_eq!(mask.policy(8_192), BinPolicy::Pass);
    }

    #[test]
    fn mask_spec_toml_uses_kind_tag() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            mask: MaskSpec,
        }
        let text = "[mask]\nkind = \"band_stop\"\nlow_hz = 50.0\nhigh_hz = 60.0\ngain = 0.1\n";
        let parsed: Wrapper = toml::from_str(text).unwrap();
        assert_eq!(
            parsed.mask,
            MaskSpec::BandStop {
                low_hz: 50.0,
                high_hz: 60.0,
                gain: 0.1
            }
        );
    }

    #[test]
    fn default_mask_is_pass_through() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            mask: MaskSpec,
        }
        assert_eq!(MaskSpec::default(), MaskSpec::PassThrough);

        let text = toml::to_string(&Wrapper { mask: MaskSpec::default() }).unwrap();
        assert!(text.contains("kind = \"pass_through\""), "{text}");
        let parsed: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(parsed.mask, MaskSpec::PassThrough);
    }
}
