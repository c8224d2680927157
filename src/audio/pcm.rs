//! 16-bit PCM frames and sample conversions.
//!
//! Frames travel through the stream log as little-endian `i16` bytes.

/// Divisor used to map `i16` samples into `[-1.0, 1.0]`.
pub const FULL_SCALE: f64 = 32_768.0;

/// Bytes per mono 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Map a PCM sample into `[-1.0, 1.0)`.
pub fn normalize(sample: i16) -> f64 {
    sample as f64 / FULL_SCALE
}

/// Clamp `value` to `[-1.0, 1.0]`, scale by 32768 and round, saturating to
/// the `i16` range.  `NaN` maps to silence.
pub fn quantize(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    let scaled = (value.clamp(-1.0, 1.0) * FULL_SCALE).round();
    scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Convert a device `f32` sample to PCM.
pub fn quantize_f32(value: f32) -> i16 {
    quantize(value as f64)
}

// ---------------------------------------------------------------------------
// PcmFrame
// ---------------------------------------------------------------------------

/// An immutable block of mono 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    samples: Box<[i16]>,
}

impl PcmFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    /// A frame of `len` zero samples.
    pub fn silence(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Decode little-endian samples; a trailing odd byte is ignored.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Self::new(
            bytes
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect(),
        )
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Encode as little-endian bytes for the stream log.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for s in self.samples.iter() {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl From<Vec<i16>> for PcmFrame {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_spans_unit_range() {
        assert_eq!(normalize(i16::MIN), -1.0);
        assert_eq!(normalize(0), 0.0);
        assert!(normalize(i16::MAX) < 1.0);
    }

    #[test]
    fn quantize_rounds_and_saturates() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(-1.0), i16::MIN);
        assert_eq!(quantize(1.0), i16::MAX); // 32768 saturates
        assert_eq!(quantize(5.0), i16::MAX);
        assert_eq!(quantize(-5.0), i16::MIN);
        assert_eq!(quantize(0.5 / FULL_SCALE), 1); // round half away from zero
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn normalize_then_quantize_is_identity() {
        for s in [i16::MIN, -12_345, -1, 0, 1, 777, i16::MAX] {
            assert_eq!(quantize(normalize(s)), s);
        }
    }

    #[test]
    fn bytes_are_little_endian() {
        let frame = PcmFrame::new(vec![0x0102, -2]);
        assert_eq!(frame.to_le_bytes(), vec![0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(PcmFrame::from_le_bytes(&frame.to_le_bytes()), frame);
    }

    #[test]
    fn trailing_odd_byte_is_dropped() {
        let frame = PcmFrame::from_le_bytes(&[1, 0, 9]);
        assert_eq!(frame.samples(), &[1]);
    }

    #[test]
    fn peak_handles_min_value() {
        assert_eq!(PcmFrame::new(vec![3, i16::MIN, 7]).peak(), 32_768);
        assert_eq!(PcmFrame::silence(4).peak(), 0);
    }
}
