//! Spectral processing: radix-2 FFT, masking hooks, per-frame effect.
//!
//! # Pipeline
//!
//! ```text
//! PcmFrame → EffectProcessor { analysis FFT → SpectralMask → synthesis IFFT } → PcmFrame
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use voice_fx::audio::PcmFrame;
//! use voice_fx::dsp::{EffectProcessor, LowPass};
//!
//! let mut fx = EffectProcessor::new(512, 1024, 1024, Arc::new(LowPass { cutoff_bin: 64 })).unwrap();
//! let out = fx.process(&PcmFrame::silence(512)).unwrap();
//! assert_eq!(out.len(), 512);
//! ```

pub mod effect;
pub mod fft;
pub mod mask;

pub use effect::{EffectError, EffectProcessor};
pub use fft::{transform, validate_size, ComplexBuffer, Direction, SpectralTransform, TransformError};
pub use mask::{BandStop, BinPolicy, HighPass, LowPass, MaskSpec, PassThrough, SpectralMask};
