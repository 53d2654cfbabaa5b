//! Small shared utilities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{sleep, spawn};
use std::time::Duration;

/// A cancellation flag shared by every work order of one search.
///
/// Cloning produces another handle to the same flag. Drivers poll it between
/// sibling candidates only, so cancellation never interrupts a candidate mid
/// exploration; each job winds down at its next checkpoint and reports its
/// best result so far.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Arm a timer that cancels this token after `dur`. A dedicated sleeper
    /// thread per call; searches arm at most one.
    pub fn deadline(&self, dur: Duration) {
        let signal = self.clone();
        spawn(move || {
            sleep(dur);
            signal.cancel();
        });
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
