//! Cooperative cancellation shared by the session threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A cloneable stop flag.  Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Cancel from a timer thread once `delay` has passed.  The thread exits
    /// early if the token is cancelled by someone else first.
    pub fn cancel_after(&self, delay: Duration) -> std::io::Result<JoinHandle<()>> {
        const TICK: Duration = Duration::from_millis(50);
        let token = self.clone();
        thread::Builder::new()
            .name("session-timer".into())
            .spawn(move || {
                // A delay past the clock's range never fires.
                let deadline = Instant::now().checked_add(delay);
                while !token.is_cancelled() {
                    let now = Instant::now();
                    let Some(deadline) = deadline else {
                        thread::sleep(TICK);
                        continue;
                    };
                    if now >= deadline {
                        log::info!("session: {delay:?} elapsed, stopping");
                        token.cancel();
                        return;
                    }
                    thread::sleep(TICK.min(deadline - now));
                }
            })
    }
}
