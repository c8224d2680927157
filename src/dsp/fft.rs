//! In-place radix-2 complex FFT.
//!
//! The transform runs in two passes over the caller's buffer:
//!
//! 1. a bit-reversal permutation (index walk, each pair swapped once), then
//! 2. iterative Danielson–Lanczos butterflies whose twiddle factors come from
//!    the half-angle recurrence instead of a `sin`/`cos` call per butterfly.
//!
//! Sign convention: [`Direction::Forward`] uses `e^{+iθ}`, [`Direction::Inverse`]
//! uses `e^{-iθ}`.  The inverse is **unnormalised**: divide every output
//! sample by `N` to recover the original signal.
//!
//! No scratch memory is used, so concurrent calls on distinct buffers never
//! alias each other.
//!
//! # Example
//!
//! ```rust
//! use num_complex::Complex64;
//! use voice_fx::dsp::{transform, Direction};
//!
//! let mut data = vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)];
//! transform(&mut data, Direction::Forward).unwrap();
//! assert_eq!(data, vec![Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)]);
//!
//! // Three samples cannot be transformed.
//! let mut odd = vec![Complex64::new(0.0, 0.0); 3];
//! assert!(transform(&mut odd, Direction::Forward).is_err());
//! ```

use std::f64::consts::PI;
use std::ops::{Deref, DerefMut};

use num_complex::Complex64;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way a transform runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Time → frequency (angle sign `+1`).
    Forward,
    /// Frequency → time (angle sign `-1`, unnormalised).
    Inverse,
}

impl Direction {
    /// Angle sign used for the twiddle factors.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Inverse => -1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TransformError
// ---------------------------------------------------------------------------

/// Rejected transform preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("transform size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("transform size {0} is below the minimum of 2")]
    TooSmall(usize),

    #[error("buffer holds {got} samples but the transform was planned for {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Check that `size` is a usable transform length (a power of two, ≥ 2).
pub fn validate_size(size: usize) -> Result<usize, TransformError> {
    if size < 2 {
        return Err(TransformError::TooSmall(size));
    }
    if !size.is_power_of_two() {
        return Err(TransformError::NotPowerOfTwo(size));
    }
    Ok(size)
}

// ---------------------------------------------------------------------------
// Free function
// ---------------------------------------------------------------------------

/// Transform `data` in place, validating its length first.
///
/// # Errors
///
/// [`TransformError::TooSmall`] or [`TransformError::NotPowerOfTwo`] when
/// `data.len()` is not a valid transform size.  `data` is left untouched in
/// that case.
pub fn transform(data: &mut [Complex64], direction: Direction) -> Result<(), TransformError> {
    validate_size(data.len())?;
    radix2(data, direction.sign());
    Ok(())
}

// ---------------------------------------------------------------------------
// SpectralTransform
// ---------------------------------------------------------------------------

/// A transform "plan": a validated size that can be reused for any number of
/// buffers.
///
/// The plan holds no mutable state, so one value can be copied into every
/// thread that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectralTransform {
    size: usize,
}

impl SpectralTransform {
    /// Plan a transform of `size` complex samples.
    pub fn new(size: usize) -> Result<Self, TransformError> {
        Ok(Self {
            size: validate_size(size)?,
        })
    }

    /// Number of complex samples this plan transforms.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Transform `data` in place.
    ///
    /// # Errors
    ///
    /// [`TransformError::LengthMismatch`] when `data.len()` differs from the
    /// planned size.
    pub fn process(
        &self,
        data: &mut [Complex64],
        direction: Direction,
    ) -> Result<(), TransformError> {
        if data.len() != self.size {
            return Err(TransformError::LengthMismatch {
                expected: self.size,
                got: data.len(),
            });
        }
        radix2(data, direction.sign());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ComplexBuffer
// ---------------------------------------------------------------------------

/// A heap buffer of complex samples whose length is a valid transform size.
///
/// The length is checked once in [`ComplexBuffer::zeroed`]; afterwards
/// [`ComplexBuffer::transform`] cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexBuffer {
    data: Vec<Complex64>,
}

impl ComplexBuffer {
    /// Allocate `size` zeroed samples.
    pub fn zeroed(size: usize) -> Result<Self, TransformError> {
        validate_size(size)?;
        Ok(Self {
            data: vec![Complex64::new(0.0, 0.0); size],
        })
    }

    /// Reset every sample to `0 + 0i`.
    pub fn clear(&mut self) {
        self.data.fill(Complex64::new(0.0, 0.0));
    }

    /// Transform the buffer in place.
    pub fn transform(&mut self, direction: Direction) {
        radix2(&mut self.data, direction.sign());
    }

    /// Multiply every sample by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.data {
            *c *= factor;
        }
    }
}

impl Deref for ComplexBuffer {
    type Target = [Complex64];

    fn deref(&self) -> &[Complex64] {
        &self.data
    }
}

impl DerefMut for ComplexBuffer {
    fn deref_mut(&mut self) -> &mut [Complex64] {
        &mut self.data
    }
}

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

/// Caller guarantees `data.len()` is a power of two ≥ 2.
fn radix2(data: &mut [Complex64], sign: f64) {
    bit_reverse_permute(data);
    butterflies(data, sign);
}

/// Move the sample at index `i` to the bit-reversed index of `i`.
fn bit_reverse_permute(data: &mut [Complex64]) {
    let n = data.len();
    let mut j = 0usize;

    // The last index reverses onto itself, so the walk stops one short.
    for i in 0..n - 1 {
        if j > i {
            data.swap(i, j);
        }
        let mut m = n >> 1;
        while m >= 1 && j >= m {
            j -= m;
            m >>= 1;
        }
        j += m;
    }
}

/// Danielson–Lanczos passes over a bit-reversed buffer.
fn butterflies(data: &mut [Complex64], sign: f64) {
    let n = data.len();
    let mut half = 1usize;

    while half < n {
        let step = half << 1;
        let theta = sign * PI / half as f64;

        // w_{m+1} = w_m + w_m * (wpr + i*wpi)
        let wtemp = (0.5 * theta).sin();
        let wpr = -2.0 * wtemp * wtemp;
        let wpi = theta.sin();
        let mut w = Complex64::new(1.0, 0.0);

        for m in 0..half {
            for i in (m..n).step_by(step) {
                let j = i + half;
                let t = w * data[j];
                data[j] = data[i] - t;
                data[i] += t;
            }
            w = Complex64::new(
                w.re * wpr - w.im * wpi + w.re,
                w.im * wpr + w.re * wpi + w.im,
            );
        }

        half = step;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
