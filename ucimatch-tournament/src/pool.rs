//! Fixed-size worker pool
//!
//! Level 4 - Utilities

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::error;

use crate::error::PoolError;

struct PoolState {
    in_flight: usize,
    accepting: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    drained: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs submitted tasks on a fixed number of named threads
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    shared: Arc<Shared>,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

impl WorkerPool {
    /// Pool with `threads` workers (at least one)
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("ucimatch-worker-{}", i))
            .build()?;
        Ok(Self {
            pool,
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    in_flight: 0,
                    accepting: true,
                }),
                drained: Condvar::new(),
            }),
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `task`; a panicking task is logged and does not take its worker down
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.lock();
            if !state.accepting {
                return Err(PoolError::ShuttingDown);
            }
            state.in_flight += 1;
        }

        let shared = Arc::clone(&self.shared);
        self.pool.spawn(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                error!(panic = panic_message(payload.as_ref()), "worker task panicked");
            }
            let mut state = shared.lock();
            state.in_flight -= 1;
            if state.in_flight == 0 {
                shared.drained.notify_all();
            }
        });
        Ok(())
    }

    /// Tasks submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }

    /// Stop accepting work and wait for in-flight tasks
    ///
    /// Returns true when every task finished before `deadline` (None = wait
    /// forever). Calling it again is harmless.
    pub fn shutdown(&self, deadline: Option<Duration>) -> bool {
        let until = deadline.map(|d| Instant::now() + d);
        let mut state = self.shared.lock();
        state.accepting = false;
        while state.in_flight > 0 {
            match until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        break;
                    }
                    state = self
                        .shared
                        .drained
                        .wait_timeout(state, until - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    state = self
                        .shared
                        .drained
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        state.in_flight == 0
    }
}
