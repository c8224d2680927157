//! voice-fx library - real-time spectral voice effect (capture → FFT mask → playback)

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod hotkey;
pub mod pipeline;
pub mod stream;
