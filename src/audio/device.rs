//! `cpal` host/device lookup shared by capture and playback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised by the capture and playback device adapters.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default {0} device found on the audio host")]
    NoDevice(&'static str),

    #[error("no {kind} device named {name:?}")]
    DeviceNotFound { kind: &'static str, name: String },

    #[error("failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported device sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// Reported asynchronously by the device callback.
    #[error("audio stream failed: {0}")]
    Stream(String),

    /// The device side hung up without being asked to stop.
    #[error("audio device disconnected")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps a cpal stream alive; dropping it stops the stream.
pub struct StreamHandle {
    stream: cpal::Stream,
}

impl StreamHandle {
    pub(crate) fn new(stream: cpal::Stream) -> Self {
        Self { stream }
    }

    pub(crate) fn play(&self) -> Result<(), DeviceError> {
        self.stream.play()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// The named input device, or the host default when `name` is `None`.
pub fn input_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(DeviceError::NoDevice("input")),
        Some(name) => find_named(host.input_devices()?, "input", name),
    }
}

/// The named output device, or the host default when `name` is `None`.
pub fn output_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host.default_output_device().ok_or(DeviceError::NoDevice("output")),
        Some(name) => find_named(host.output_devices()?, "output", name),
    }
}

fn find_named(
    mut devices: impl Iterator<Item = cpal::Device>,
    kind: &'static str,
    name: &str,
) -> Result<cpal::Device, DeviceError> {
    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| DeviceError::DeviceNotFound {
            kind,
            name: name.to_owned(),
        })
}

/// Names of the available `(inputs, outputs)` on the default host.
pub fn list_devices() -> Result<(Vec<String>, Vec<String>), DeviceError> {
    let host = cpal::default_host();
    let inputs = host.input_devices()?.filter_map(|d| d.name().ok()).collect();
    let outputs = host.output_devices()?.filter_map(|d| d.name().ok()).collect();
    Ok((inputs, outputs))
}
