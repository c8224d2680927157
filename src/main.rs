//! Application entry point for voice-fx.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (defaults on first run).
//! 3. `--write-config` / `--list-devices` short-circuit here.
//! 4. Build the [`Session`] (validates the config).
//! 5. Open the cpal capture stream on the main thread.
//! 6. Arm the stop key and the optional `--seconds` timer.
//! 7. Run the session; the playback device is opened on the feeder thread.

use anyhow::{Context, Result};
use clap::Parser;

use voice_fx::{
    app::Session,
    audio::{list_devices, CpalCapture, CpalPlayback},
    cli::Args,
    config::AppConfig,
    hotkey::{parse_key, StopKeyListener},
};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line + config
    let args = Args::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) if args.config.is_none() => {
            log::warn!("Failed to load config ({e:#}); using defaults");
            AppConfig::default()
        }
        Err(e) => return Err(e),
    };

    // 3. One-shot commands
    if args.write_config {
        let path = args.config_path();
        config
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    if args.list_devices {
        let (inputs, outputs) = list_devices()?;
        println!("Input devices:");
        inputs.iter().for_each(|name| println!("  {name}"));
        println!("Output devices:");
        outputs.iter().for_each(|name| println!("  {name}"));
        return Ok(());
    }

    // 4. Session
    let session = Session::new(config).context("invalid configuration")?;
    let cancel = session.cancel_token();
    log::info!("voice-fx starting up");

    // 5. Capture
    let capture = CpalCapture::open(&session.config().audio).context("opening capture device")?;
    log::info!(
        "Capture device: {} Hz, {} channel(s)",
        capture.device_rate(),
        capture.device_channels()
    );

    // 6. Stop conditions
    let stop_name = &session.config().hotkey.stop_key;
    let _stop_key = match parse_key(stop_name) {
        Some(key) => match StopKeyListener::start(key, cancel.clone()) {
            Ok(listener) => {
                log::info!("Press {stop_name} to stop");
                Some(listener)
            }
            Err(e) => {
                log::warn!("Stop key unavailable: {e}");
                None
            }
        },
        None => {
            log::warn!("Unknown stop key {stop_name:?}; stop key disabled");
            None
        }
    };
    let _timer = args
        .run_duration()
        .map(|duration| cancel.cancel_after(duration))
        .transpose()
        .context("starting session timer")?;

    // 7. Run
    let audio = session.config().audio.clone();
    let playback = session.config().playback.clone();
    let report = session.run(capture, move || CpalPlayback::open(&audio, &playback))?;

    log::info!(
        "Done: {} frames captured, {} bytes played{}",
        report.capture.frames,
        report.playback.bytes,
        if report.capture.cancelled { " (stopped)" } else { "" }
    );
    Ok(())
}
