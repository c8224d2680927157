//! Dedicated OS-thread stop-key listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread and
//! has no shutdown API.  [`StopKeyListener`] owns that thread and a disarm
//! flag; dropping the handle disarms the callback, but the thread itself
//! stays blocked in the rdev event loop until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::pipeline::CancelToken;

// ---------------------------------------------------------------------------
// StopKeyListener
// ---------------------------------------------------------------------------

/// Trips a [`CancelToken`] when the stop key is pressed.
pub struct StopKeyListener {
    disarmed: Arc<AtomicBool>,
    /// Never joined: `rdev::listen` does not return.
    _thread: std::thread::JoinHandle<()>,
}

impl StopKeyListener {
    /// Spawn the listener thread for `key`.
    ///
    /// Use [`crate::hotkey::parse_key`] to obtain `key` from a config string.
    ///
    /// # Errors
    ///
    /// The OS refused to create the thread.
    pub fn start(key: rdev::Key, cancel: CancelToken) -> std::io::Result<Self> {
        let disarmed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disarmed);

        let thread = std::thread::Builder::new()
            .name("stop-key-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if is_stop_press(&event.event_type, key) && !cancel.is_cancelled() {
                        log::info!("hotkey: {key:?} pressed, stopping session");
                        cancel.cancel();
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {e:?}");
                }
            })?;

        Ok(Self {
            disarmed,
            _thread: thread,
        })
    }
}

impl Drop for StopKeyListener {
    fn drop(&mut self) {
        self.disarmed.store(true, Ordering::Relaxed);
    }
}

fn is_stop_press(event: &rdev::EventType, key: rdev::Key) -> bool {
    matches!(event, rdev::EventType::KeyPress(k) if *k == key)
}
