//! Channel mixing and sample-rate conversion between device and pipeline.
//!
//! The processing path is mono at the configured sample rate.  Devices rarely
//! agree, so capture down-mixes and resamples on the way in, and playback
//! resamples and up-mixes on the way out:
//!
//! ```text
//! device (n ch, rate D) → downmix_to_mono → StreamResampler(D → R) → pipeline
//! pipeline → PullResampler(R → D) → upmix_from_mono → device (n ch, rate D)
//! ```
//!
//! Both resamplers interpolate linearly.  [`StreamResampler`] carries its fractional
//! position and the last input sample across calls, so callback-sized blocks
//! join without clicks.

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; `channels == 0` yields an
/// empty vector.
///
/// # Example
///
/// ```rust
/// use voice_fx::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Write each mono sample to every channel of the interleaved `out` buffer.
///
/// `out.len() / channels` frames are written; `mono` must hold at least that
/// many samples.
pub fn upmix_from_mono<T: Copy>(mono: &[T], channels: u16, out: &mut [T]) {
    let channels = channels.max(1) as usize;
    for (frame, &sample) in out.chunks_exact_mut(channels).zip(mono) {
        frame.fill(sample);
    }
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Streaming linear-interpolation resampler.
pub struct StreamResampler {
    source_rate: u32,
    target_rate: u32,
    /// Input samples advanced per output sample.
    step: f64,
    /// Position of the next output sample, relative to `last`.
    pos: f64,
    /// Final sample of the previous block.
    last: Option<f32>,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let step = if source_rate == 0 || target_rate == 0 {
            1.0
        } else {
            source_rate as f64 / target_rate as f64
        };
        Self {
            source_rate,
            target_rate,
            step,
            pos: 0.0,
            last: None,
        }
    }

    /// `true` when no conversion takes place.
    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate
    }

    /// Resample one block and append the result to `out`.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }
        if input.is_empty() {
            return;
        }

        // Virtual sequence: the carried sample (if any) followed by `input`.
        let carried = usize::from(self.last.is_some());
        let total = input.len() + carried;
        let at = |i: usize| -> f32 {
            match (i, self.last) {
                (0, Some(last)) => last,
                _ => input[i - carried],
            }
        };

        while self.pos + 1.0 < total as f64 {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            out.push(at(idx) * (1.0 - frac) + at(idx + 1) * frac);
            self.pos += self.step;
        }

        self.pos -= (total - 1) as f64;
        self.last = input.last().copied();
    }

    /// Forget the carried sample and position.
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.last = None;
    }
}

// ---------------------------------------------------------------------------
// PullResampler
// ---------------------------------------------------------------------------

/// Linear-interpolation resampler driven by the consumer.
///
/// Output callbacks know how many samples they must produce, not how many
/// they will consume, so each output sample pulls input on demand.
pub struct PullResampler {
    step: f64,
    pos: f64,
    prev: f32,
    next: f32,
}

impl PullResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let step = if source_rate == 0 || target_rate == 0 {
            1.0
        } else {
            source_rate as f64 / target_rate as f64
        };
        Self {
            step,
            pos: 1.0,
            prev: 0.0,
            next: 0.0,
        }
    }

    /// Produce one output sample, calling `fetch` for each input consumed.
    pub fn next_sample(&mut self, mut fetch: impl FnMut() -> f32) -> f32 {
        while self.pos >= 1.0 {
            self.prev = self.next;
            self.next = fetch();
            self.pos -= 1.0;
        }
        let out = self.prev + (self.next - self.prev) * self.pos as f32;
        self.pos += self.step;
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Channel mixing ----------------------------------------------------

    #[test]
    fn downmix_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_four_channel() {
        let out = downmix_to_mono(&[0.4_f32; 4], 4);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn upmix_duplicates_into_every_channel() {
        let mut out = [0i16; 6];
        upmix_from_mono(&[1, 2, 3], 2, &mut out);
        assert_eq!(out, [1, 1, 2, 2, 3, 3]);
    }

    // ---- StreamResampler ---------------------------------------------------

    fn run_blocks(resampler: &mut StreamResampler, input: &[f32], block: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for chunk in input.chunks(block) {
            resampler.process(chunk, &mut out);
        }
        out
    }

    #[test]
    fn equal_rates_pass_through() {
        let mut r = StreamResampler::new(32_768, 32_768);
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(run_blocks(&mut r, &input, 7), input);
    }

    #[test]
    fn downsample_length_tracks_ratio_across_blocks() {
        let mut r = StreamResampler::new(48_000, 16_000);
        let out = run_blocks(&mut r, &vec![0.0; 48_000], 441);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn device_rate_to_pipeline_rate_length() {
        let mut r = StreamResampler::new(44_100, 32_768);
        let out = run_blocks(&mut r, &vec![0.0; 44_100], 512);
        assert!(out.len().abs_diff(32_768) <= 1, "got {}", out.len());
    }

    #[test]
    fn constant_signal_keeps_amplitude() {
        let mut r = StreamResampler::new(44_100, 32_768);
        for s in run_blocks(&mut r, &vec![0.5; 4_410], 100) {
            assert!((s - 0.5).abs() < 1e-6, "amplitude drift: {s}");
        }
    }

    #[test]
    fn block_size_does_not_change_output() {
        let input: Vec<f32> = (0..2_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let whole = run_blocks(&mut StreamResampler::new(48_000, 32_768), &input, input.len());
        let split = run_blocks(&mut StreamResampler::new(48_000, 32_768), &input, 37);
        assert!(whole.len().abs_diff(split.len()) <= 1);
        for (a, b) in whole.iter().zip(&split) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn ramp_is_interpolated_linearly() {
        // 2x upsample of a ramp yields the midpoints.
        let mut r = StreamResampler::new(1, 2);
        let mut out = Vec::new();
        r.process(&[0.0, 1.0, 2.0], &mut out);
        r.process(&[3.0], &mut out);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    // ---- PullResampler -----------------------------------------------------

    #[test]
    fn pull_equal_rates_delays_by_one_sample() {
        let mut r = PullResampler::new(8_000, 8_000);
        let mut input = [1.0_f32, 2.0, 3.0].into_iter();
        let out: Vec<f32> = (0..3)
            .map(|_| r.next_sample(|| input.next().unwrap_or(0.0)))
            .collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn pull_consumes_inputs_at_rate_ratio() {
        let mut r = PullResampler::new(32_768, 65_536);
        let mut pulled: i32 = 0;
        for _ in 0..1_000 {
            r.next_sample(|| {
                pulled += 1;
                0.0
            });
        }
        assert!(pulled.abs_diff(500) <= 1, "pulled {pulled}");
    }
}
