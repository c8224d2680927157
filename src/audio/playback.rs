//! Speaker output via `cpal`.
//!
//! [`CpalPlayback`] owns a [`PlaybackRing`] sized to the configured device
//! buffer.  The feeder writes PCM bytes into the ring; the output callback
//! drains it, converts to the device format and signals the feeder whenever
//! at least half of the ring is free again:
//!
//! ```text
//! PcmSink::write(bytes) → PlaybackRing ──▶ cpal callback
//!                              ▲            (PullResampler → upmix → T)
//!   PcmSink::wait_refill ◀── refill condvar (≥ half free)
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};

use super::buffer::PlaybackRing;
use super::device::{self, DeviceError, StreamHandle};
use super::pcm::{normalize, BYTES_PER_SAMPLE};
use super::resample::{upmix_from_mono, PullResampler};
use crate::config::{AudioConfig, PlaybackConfig};

// ---------------------------------------------------------------------------
// PcmSink
// ---------------------------------------------------------------------------

/// A consumer of little-endian mono PCM bytes with a fixed-size device buffer.
pub trait PcmSink {
    /// Size of the device buffer in bytes.
    fn buffer_bytes(&self) -> usize;

    /// Queue `bytes` for playback.
    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Begin playback of the queued data.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Wait until at least half of the device buffer can be refilled.
    ///
    /// Returns `false` when `timeout` elapsed first.
    fn wait_refill(&mut self, timeout: Duration) -> Result<bool, DeviceError>;

    /// Wait up to `timeout` for queued audio to finish playing.
    fn drain(&mut self, _timeout: Duration) -> Result<(), DeviceError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared ring
// ---------------------------------------------------------------------------

struct RingShared {
    ring: Mutex<PlaybackRing>,
    refill: Condvar,
}

impl RingShared {
    fn lock(&self) -> MutexGuard<'_, PlaybackRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Output callback state, owned by the audio thread.
struct Renderer<T> {
    shared: Arc<RingShared>,
    channels: u16,
    resampler: PullResampler,
    mono: Vec<T>,
}

impl<T: SizedSample + FromSample<f32>> Renderer<T> {
    fn fill(&mut self, data: &mut [T]) {
        let frames = data.len() / self.channels.max(1) as usize;
        self.mono.clear();

        let half_free = {
            let mut ring = self.shared.lock();
            for _ in 0..frames {
                let value = self.resampler.next_sample(|| normalize(ring.pop()) as f32);
                self.mono.push(T::from_sample(value));
            }
            ring.half_free()
        };

        upmix_from_mono(&self.mono, self.channels, data);
        if half_free {
            self.shared.refill.notify_all();
        }
    }
}

// ---------------------------------------------------------------------------
// CpalPlayback
// ---------------------------------------------------------------------------

/// [`PcmSink`] backed by a cpal output stream.
pub struct CpalPlayback {
    shared: Arc<RingShared>,
    error: Arc<Mutex<Option<String>>>,
    stream: StreamHandle,
    buffer_bytes: usize,
    /// Odd byte left over from the previous write.
    carry: Option<u8>,
    started: bool,
    write_timeout: Duration,
}

impl CpalPlayback {
    /// Open the configured (or default) output device.  Playback stays
    /// silent until [`PcmSink::start`].
    ///
    /// # Errors
    ///
    /// Any [`DeviceError`] raised while locating or configuring the device.
    pub fn open(audio: &AudioConfig, playback: &PlaybackConfig) -> Result<Self, DeviceError> {
        let device = device::output_device(audio.output_device.as_deref())?;
        let supported = device.default_output_config()?;

        let channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();

        log::info!(
            "playback: opening {:?} ({device_rate} Hz, {channels} ch, {format:?}), buffer {} bytes",
            device.name().unwrap_or_default(),
            playback.buffer_bytes
        );

        let shared = Arc::new(RingShared {
            ring: Mutex::new(PlaybackRing::new(
                (playback.buffer_bytes / BYTES_PER_SAMPLE).max(1),
            )),
            refill: Condvar::new(),
        });
        let error = Arc::new(Mutex::new(None));

        let rates = (audio.sample_rate, device_rate);
        let stream = match format {
            SampleFormat::F32 => build_output::<f32>(&device, &stream_config, &shared, &error, rates, channels),
            SampleFormat::I16 => build_output::<i16>(&device, &stream_config, &shared, &error, rates, channels),
            SampleFormat::U16 => build_output::<u16>(&device, &stream_config, &shared, &error, rates, channels),
            other => return Err(DeviceError::UnsupportedFormat(other)),
        }?;
        // Some hosts start streams on creation.
        if let Err(err) = stream.pause() {
            log::debug!("playback: pause before start not supported: {err}");
        }

        Ok(Self {
            shared,
            error,
            stream: StreamHandle::new(stream),
            buffer_bytes: playback.buffer_bytes,
            carry: None,
            started: false,
            write_timeout: Duration::from_millis(playback.refill_timeout_ms),
        })
    }

    /// Silence samples emitted so far because the ring ran dry.
    pub fn underrun_samples(&self) -> u64 {
        self.shared.lock().underrun_samples()
    }

    fn check_error(&self) -> Result<(), DeviceError> {
        match self.error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(message) => Err(DeviceError::Stream(message)),
            None => Ok(()),
        }
    }
}

/// Decode little-endian samples, carrying an odd trailing byte to the next call.
fn decode_le(carry: &mut Option<u8>, bytes: &[u8]) -> Vec<i16> {
    let mut samples = Vec::with_capacity(bytes.len() / BYTES_PER_SAMPLE + 1);
    let mut rest = bytes;
    if let Some(low) = carry.take() {
        match rest.split_first() {
            Some((&high, tail)) => {
                samples.push(i16::from_le_bytes([low, high]));
                rest = tail;
            }
            None => {
                *carry = Some(low);
                return samples;
            }
        }
    }
    let mut pairs = rest.chunks_exact(BYTES_PER_SAMPLE);
    samples.extend(pairs.by_ref().map(|b| i16::from_le_bytes([b[0], b[1]])));
    *carry = pairs.remainder().first().copied();
    samples
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<RingShared>,
    error: &Arc<Mutex<Option<String>>>,
    (pipeline_rate, device_rate): (u32, u32),
    channels: u16,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let mut renderer = Renderer::<T> {
        shared: Arc::clone(shared),
        channels,
        resampler: PullResampler::new(pipeline_rate, device_rate),
        mono: Vec::new(),
    };
    let error = Arc::clone(error);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.fill(data),
        move |err: cpal::StreamError| {
            log::error!("playback: cpal stream error: {err}");
            *error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

impl PcmSink for CpalPlayback {
    fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        self.check_error()?;
        let samples = decode_le(&mut self.carry, bytes);
        let mut rest = samples.as_slice();

        let mut ring = self.shared.lock();
        loop {
            let taken = ring.push_slice(rest);
            rest = &rest[taken..];
            if rest.is_empty() {
                return Ok(());
            }
            if !self.started {
                log::warn!("playback: ring full before start, dropped {} samples", rest.len());
                return Ok(());
            }
            let (guard, waited) = self
                .shared
                .refill
                .wait_timeout_while(ring, self.write_timeout, |r| r.free() == 0)
                .unwrap_or_else(PoisonError::into_inner);
            ring = guard;
            if waited.timed_out() {
                return Err(DeviceError::Stream(format!(
                    "output device consumed nothing for {:?}",
                    self.write_timeout
                )));
            }
        }
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.check_error()?;
        if !self.started {
            self.stream.play()?;
            self.started = true;
            log::info!("playback: started");
        }
        Ok(())
    }

    fn wait_refill(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        self.check_error()?;
        let ring = self.shared.lock();
        let (ring, _) = self
            .shared
            .refill
            .wait_timeout_while(ring, timeout, |r| !r.half_free())
            .unwrap_or_else(PoisonError::into_inner);
        Ok(ring.half_free())
    }

    fn drain(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        self.check_error()?;
        let ring = self.shared.lock();
        let (ring, waited) = self
            .shared
            .refill
            .wait_timeout_while(ring, timeout, |r| !r.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if waited.timed_out() {
            log::warn!("playback: {} samples still queued after {timeout:?}", ring.len());
        }
        Ok(())
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        let underruns = self.underrun_samples();
        if underruns > 0 {
            log::debug!("playback: {underruns} silence samples inserted on underrun");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(capacity: usize) -> Arc<RingShared> {
        Arc::new(RingShared {
            ring: Mutex::new(PlaybackRing::new(capacity)),
            refill: Condvar::new(),
        })
    }

    #[test]
    fn renderer_upmixes_ring_samples_to_every_channel() {
        let shared = shared(8);
        shared.lock().push_slice(&[16_384, -16_384, 0]);

        let mut renderer = Renderer::<f32> {
            shared: Arc::clone(&shared),
            channels: 2,
            resampler: PullResampler::new(8_000, 8_000),
            mono: Vec::new(),
        };
        let mut out = [1.0_f32; 8];
        renderer.fill(&mut out);

        // The interpolator lags one sample behind the ring.
        assert_eq!(out, [0.0, 0.0, 0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
        assert_eq!(shared.lock().underrun_samples(), 1);
    }

    #[test]
    fn decode_carries_odd_byte_between_writes() {
        let mut carry = None;
        assert_eq!(decode_le(&mut carry, &[0x01, 0x02, 0x03]), vec![0x0201]);
        assert_eq!(carry, Some(0x03));
        assert!(decode_le(&mut carry, &[]).is_empty());
        assert_eq!(decode_le(&mut carry, &[0xFF]), vec![i16::from_le_bytes([0x03, 0xFF])]);
        assert_eq!(carry, None);
    }

    #[test]
    fn renderer_signals_refill_when_half_free() {
        let shared = shared(4);
        shared.lock().push_slice(&[1, 2, 3, 4]);
        let mut renderer = Renderer::<i16> {
            shared: Arc::clone(&shared),
            channels: 1,
            resampler: PullResampler::new(8_000, 8_000),
            mono: Vec::new(),
        };

        let waiter = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let ring = shared.lock();
                let (ring, _) = shared
                    .refill
                    .wait_timeout_while(ring, Duration::from_secs(5), |r| !r.half_free())
                    .unwrap();
                ring.half_free()
            })
        };

        let mut out = [0i16; 2];
        renderer.fill(&mut out);
        assert!(waiter.join().unwrap());
    }
}
