//! Execution backends for top-level search jobs.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// A boxed, self-contained search job.
pub type SearchJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs dispatched jobs to completion.
///
/// `dispatch` hands over one job; `wait` blocks until every job dispatched
/// since the last wait has finished. Backends must not reorder results into
/// the search: for identical inputs, a synchronous backend and a pooled
/// backend produce identical decisions and differ only in wall-clock time.
pub trait Dispatcher {
    fn dispatch(&mut self, job: SearchJob);
    fn wait(&mut self);
}

/// Runs every job immediately on the calling thread, in dispatch order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SynchronousDispatcher;

impl Dispatcher for SynchronousDispatcher {
    fn dispatch(&mut self, job: SearchJob) {
        job();
    }

    fn wait(&mut self) {}
}

/// Fans jobs out over a rayon thread pool.
///
/// A panicking job is contained by the pool's panic handler and simply never
/// reports a result; `wait` still returns once its slot is released.
pub struct ThreadPoolDispatcher {
    pool: rayon::ThreadPool,
    pending: Arc<(Mutex<usize>, Condvar)>,
}

impl ThreadPoolDispatcher {
    /// One worker per logical CPU.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    pub fn with_threads(num_threads: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .panic_handler(|_| log::warn!("search job panicked and reports no result"))
            .build()
            .unwrap();
        ThreadPoolDispatcher { pool, pending: Arc::new((Mutex::new(0), Condvar::new())) }
    }
}

impl Default for ThreadPoolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for ThreadPoolDispatcher {
    fn dispatch(&mut self, job: SearchJob) {
        *self.pending.0.lock() += 1;
        let pending = self.pending.clone();
        self.pool.spawn(move || {
            // Decrements on drop, so a panicking job still releases its slot.
            let _slot = SlotGuard(pending);
            job();
        });
    }

    fn wait(&mut self) {
        let (lock, cvar) = &*self.pending;
        let mut count = lock.lock();
        while *count > 0 {
            cvar.wait(&mut count);
        }
    }
}

struct SlotGuard(Arc<(Mutex<usize>, Condvar)>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.0;
        *lock.lock() -= 1;
        cvar.notify_all();
    }
}
