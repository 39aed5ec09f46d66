//! Cooperative shutdown for the shipment loop.
//!
//! The loop only looks at the signal between passes and while idling, so a
//! request never interrupts a file mid-delivery or a tracker save.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared shutdown request flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying flag, for wiring into OS signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on a shutdown request.
    ///
    /// Returns `true` if shutdown was requested before or during the wait.
    /// A duration too long to represent waits for shutdown alone.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_requested() {
                return true;
            }
            let nap = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    WAIT_POLL_INTERVAL.min(deadline - now)
                }
                None => WAIT_POLL_INTERVAL,
            };
            thread::sleep(nap);
        }
    }
}
