//! Fixed-capacity circular buffer feeding the playback device.
//!
//! Unlike a recording tail buffer, playback must never drop queued audio: a
//! push only fills free space and reports how much it took, and a pop that
//! finds too little data pads the rest with silence (an underrun).
//!
//! # Example
//!
//! ```rust
//! use voice_fx::audio::PlaybackRing;
//!
//! let mut ring = PlaybackRing::new(4);
//! assert_eq!(ring.push_slice(&[1, 2, 3, 4, 5]), 4); // 5th sample does not fit
//! let mut out = [0i16; 6];
//! assert_eq!(ring.pop_into(&mut out), 4);
//! assert_eq!(out, [1, 2, 3, 4, 0, 0]);
//! ```

// ---------------------------------------------------------------------------
// PlaybackRing
// ---------------------------------------------------------------------------

/// A fixed-capacity FIFO of PCM samples.
pub struct PlaybackRing {
    buf: Vec<i16>,
    /// Index of the oldest queued sample.
    read_pos: usize,
    /// Number of queued samples (≤ capacity).
    len: usize,
    /// Silence samples emitted because the ring ran dry.
    underrun_samples: u64,
}

impl PlaybackRing {
    /// Create a ring holding up to `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PlaybackRing capacity must be > 0");
        Self {
            buf: vec![0; capacity],
            read_pos: 0,
            len: 0,
            underrun_samples: 0,
        }
    }

    /// Queue as many of `data` as fit; returns how many were taken.
    pub fn push_slice(&mut self, data: &[i16]) -> usize {
        let capacity = self.capacity();
        let taken = data.len().min(self.free());
        let mut write_pos = (self.read_pos + self.len) % capacity;
        for &sample in &data[..taken] {
            self.buf[write_pos] = sample;
            write_pos = (write_pos + 1) % capacity;
        }
        self.len += taken;
        taken
    }

    /// Dequeue into `out`, padding any shortfall with silence.
    ///
    /// Returns the number of real (non-padding) samples written.
    pub fn pop_into(&mut self, out: &mut [i16]) -> usize {
        let capacity = self.capacity();
        let real = out.len().min(self.len);
        for slot in &mut out[..real] {
            *slot = self.buf[self.read_pos];
            self.read_pos = (self.read_pos + 1) % capacity;
        }
        self.len -= real;

        let missing = out.len() - real;
        if missing > 0 {
            out[real..].fill(0);
            self.underrun_samples += missing as u64;
        }
        real
    }

    /// Dequeue one sample, or silence on underrun.
    pub fn pop(&mut self) -> i16 {
        let mut one = [0i16; 1];
        self.pop_into(&mut one);
        one[0]
    }

    /// Discard all queued samples.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Free slots.
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// `true` when at least half of the ring can be refilled.
    pub fn half_free(&self) -> bool {
        self.free() >= self.capacity().div_ceil(2)
    }

    pub fn underrun_samples(&self) -> u64 {
        self.underrun_samples
    }

    /// Queued audio in seconds at `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Push / pop ----------------------------------------------------------

    #[test]
    fn push_and_pop_within_capacity() {
        let mut ring = PlaybackRing::new(8);
        assert_eq!(ring.push_slice(&[1, 2, 3]), 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0i16; 3];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(ring.is_empty());
        assert_eq!(ring.underrun_samples(), 0);
    }

    #[test]
    fn full_ring_rejects_instead_of_overwriting() {
        let mut ring = PlaybackRing::new(4);
        assert_eq!(ring.push_slice(&[1, 2, 3, 4]), 4);
        assert_eq!(ring.push_slice(&[5]), 0);

        let mut out = [0i16; 4];
        ring.pop_into(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn order_survives_wraparound() {
        let mut ring = PlaybackRing::new(3);
        ring.push_slice(&[1, 2, 3]);
        let mut two = [0i16; 2];
        ring.pop_into(&mut two);
        assert_eq!(ring.push_slice(&[4, 5]), 2);

        let mut out = [0i16; 3];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(out, [3, 4, 5]);
    }

    // ---- Underrun ----------------------------------------------------------

    #[test]
    fn underrun_pads_with_silence_and_is_counted() {
        let mut ring = PlaybackRing::new(4);
        ring.push_slice(&[7]);
        let mut out = [9i16; 3];
        assert_eq!(ring.pop_into(&mut out), 1);
        assert_eq!(out, [7, 0, 0]);
        assert_eq!(ring.underrun_samples(), 2);
    }

    // ---- Free space ----------------------------------------------------------

    #[test]
    fn half_free_threshold() {
        let mut ring = PlaybackRing::new(4);
        assert!(ring.half_free());
        ring.push_slice(&[1, 2, 3]);
        assert!(!ring.half_free());
        let mut one = [0i16; 1];
        ring.pop_into(&mut one);
        assert!(ring.half_free());
        assert_eq!(ring.free(), 2);
    }

    #[test]
    fn clear_resets_state() {
        let mut ring = PlaybackRing::new(4);
        ring.push_slice(&[1, 2, 3, 4]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.push_slice(&[9]), 1);
    }

    #[test]
    fn duration_secs_calculation() {
        let mut ring = PlaybackRing::new(32_768);
        ring.push_slice(&vec![0; 16_384]);
        assert!((ring.duration_secs(32_768) - 0.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "PlaybackRing capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ring = PlaybackRing::new(0);
    }
}
