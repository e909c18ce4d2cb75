//! Scoped worker pool for parallel loads.
//!
//! A [`Scheduler`] owns a dedicated rayon thread pool for the lifetime of one
//! [`Scheduler::scope`] call. Inside the scope, any number of unit-of-work
//! tasks can be submitted; the scope blocks on exit until every task has
//! settled and then surfaces the first recorded task failure, if any.
//!
//! Tasks run on pool worker threads, never on the caller, and carry no
//! ordering guarantees among themselves. Once a failure is recorded, further
//! submissions are ignored and spawned-but-unstarted tasks are skipped;
//! tasks already running are not cancelled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{LoadError, Result};

/// A bounded pool of worker threads accepting unit-of-work closures.
pub struct Scheduler {
    pool: rayon::ThreadPool,
}

impl Scheduler {
    /// Build a pool with one thread per entry of `worker_ids`.
    ///
    /// An empty list means "use all available cores".
    pub fn new(worker_ids: &[usize]) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_ids.len())
            .build()
            .map_err(|e| LoadError::Scheduler(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads in the pool.
    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `body` with a task-submission scope on this pool.
    ///
    /// Returns once every task submitted inside the scope has settled. The
    /// first task failure takes precedence over `body`'s own result; a panic
    /// inside a task propagates through the join as-is.
    pub fn scope<'scope, R, OP>(&self, body: OP) -> Result<R>
    where
        OP: FnOnce(&Scope<'_, 'scope>) -> Result<R>,
    {
        let state = Arc::new(ScopeState {
            workers: self.num_workers(),
            submitted: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
            failure: Mutex::new(None),
        });
        let result = self.pool.in_place_scope(|scope| {
            body(&Scope {
                scope,
                state: Arc::clone(&state),
            })
        });
        debug_assert_eq!(
            state.submitted.load(Ordering::Acquire),
            state.settled.load(Ordering::Acquire),
        );
        match state.take_failure() {
            Some(failure) => Err(failure),
            None => result,
        }
    }
}

/// Build a fresh [`Scheduler`] and run `body` in a scope on it.
pub fn with_scheduler<'scope, R, OP>(worker_ids: &[usize], body: OP) -> Result<R>
where
    OP: FnOnce(&Scope<'_, 'scope>) -> Result<R>,
{
    Scheduler::new(worker_ids)?.scope(body)
}

/// Task-submission handle for one [`Scheduler::scope`] region.
pub struct Scope<'a, 'scope> {
    scope: &'a rayon::Scope<'scope>,
    state: Arc<ScopeState>,
}

struct ScopeState {
    workers: usize,
    submitted: AtomicUsize,
    settled: AtomicUsize,
    failure: Mutex<Option<LoadError>>,
}

impl ScopeState {
    fn failed(&self) -> bool {
        self.failure.lock().map(|slot| slot.is_some()).unwrap_or(true)
    }

    fn record(&self, failure: LoadError) {
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(failure);
        }
    }

    fn take_failure(&self) -> Option<LoadError> {
        self.failure.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl<'a, 'scope> Scope<'a, 'scope> {
    /// Pool size; the loader uses this to size interior chunks.
    pub fn num_workers(&self) -> usize {
        self.state.workers
    }

    /// Submit one unit of work.
    ///
    /// The task receives a scope handle of its own, so work submitted from
    /// inside a task lands on the same scheduler. Submissions after a
    /// recorded failure are dropped.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce(&Scope<'_, 'scope>) -> Result<()> + Send + 'scope,
    {
        if self.state.failed() {
            return;
        }
        self.state.submitted.fetch_add(1, Ordering::AcqRel);
        let state = Arc::clone(&self.state);
        self.scope.spawn(move |scope| {
            if !state.failed() {
                let nested = Scope {
                    scope,
                    state: Arc::clone(&state),
                };
                if let Err(failure) = task(&nested) {
                    state.record(failure);
                }
            }
            state.settled.fetch_add(1, Ordering::AcqRel);
        });
    }
}
