//! Shared scanning pool and per-invocation quiescence.
//!
//! One [`IncludePool`] serves every scanner in the process: a global
//! injector queue feeding a fixed set of parked worker threads. Tasks
//! are coarse (parse one file, fan out its inclusions), so there is no
//! per-worker deque or stealing; the injector is contended rarely
//! enough that simplicity wins.
//!
//! Each `process` invocation layers a [`Visitation`] on top of the pool:
//!
//! - **Quiescence.** An in-flight count covers every dispatched task and
//!   every registered parse continuation; `sync` blocks until it drains.
//! - **Failure funneling.** Tasks return `Result`; the first error lands
//!   in a cell and re-surfaces from `sync` on the caller's thread. No
//!   unwinding across the pool boundary for ordinary errors.
//! - **Fail-fast.** Once a failure is recorded, new submissions are
//!   dropped and already-queued task bodies are skipped, but everything
//!   in flight is awaited, so workers never outlive the call.
//! - **Panic capture.** A panicking task poisons the visitation; the
//!   payload is resumed from `sync` so bugs keep their backtrace.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_deque::{Injector, Steal};
use crossbeam_utils::sync::{Parker, Unparker};

use crate::error::ScanError;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Idle workers re-check the queue at this cadence; keeps the
/// no-lost-wakeup reasoning trivial without burning a core.
const PARK_TIMEOUT: Duration = Duration::from_micros(200);

struct PoolShared {
    injector: Injector<Task>,
    unparkers: Vec<Unparker>,
    next_unpark: AtomicUsize,
    shutdown: AtomicBool,
}

impl PoolShared {
    /// Wake one worker, round-robin. Approximate fairness is enough.
    fn unpark_one(&self) {
        let n = self.unparkers.len();
        let idx = self.next_unpark.fetch_add(1, Ordering::Relaxed) % n;
        self.unparkers[idx].unpark();
    }

    fn unpark_all(&self) {
        for u in &self.unparkers {
            u.unpark();
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>, parker: Parker) {
    loop {
        match shared.injector.steal() {
            Steal::Success(task) => task(),
            Steal::Retry => {}
            Steal::Empty => {
                if shared.shutdown.load(Ordering::Acquire) {
                    break;
                }
                parker.park_timeout(PARK_TIMEOUT);
            }
        }
    }
}

struct PoolInner {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.unpark_all();
        let handles = std::mem::take(&mut *self.handles.lock().expect("pool poisoned"));
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// Bounded worker pool shared across scanner instances.
///
/// Cloning yields another handle to the same pool; workers shut down
/// when the last handle drops and the queue is drained.
#[derive(Clone)]
pub struct IncludePool {
    inner: Arc<PoolInner>,
}

impl IncludePool {
    /// Spawns `workers` threads. Panics if `workers` is 0.
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "workers must be > 0");
        let mut parkers = Vec::with_capacity(workers);
        let mut unparkers = Vec::with_capacity(workers);
        for _ in 0..workers {
            let parker = Parker::new();
            unparkers.push(parker.unparker().clone());
            parkers.push(parker);
        }
        let shared = Arc::new(PoolShared {
            injector: Injector::new(),
            unparkers,
            next_unpark: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });
        let handles = parkers
            .into_iter()
            .enumerate()
            .map(|(i, parker)| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("incscan-worker-{i}"))
                    .spawn(move || worker_loop(shared, parker))
                    .expect("failed to spawn include pool worker")
            })
            .collect();
        Self {
            inner: Arc::new(PoolInner {
                shared,
                handles: Mutex::new(handles),
            }),
        }
    }

    fn submit(&self, task: Task) {
        self.inner.shared.injector.push(task);
        self.inner.shared.unpark_one();
    }
}

struct VisitationShared {
    in_flight: Mutex<usize>,
    quiesced: Condvar,
    failure: Mutex<Option<ScanError>>,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
    failed: AtomicBool,
}

impl VisitationShared {
    fn record(&self, err: ScanError) {
        let mut slot = self.failure.lock().expect("visitation poisoned");
        if slot.is_none() {
            *slot = Some(err);
        }
        drop(slot);
        self.failed.store(true, Ordering::Release);
    }

    fn leave(&self) {
        let mut n = self.in_flight.lock().expect("visitation poisoned");
        debug_assert!(*n > 0, "visitation in-flight underflow");
        *n -= 1;
        if *n == 0 {
            self.quiesced.notify_all();
        }
    }
}

/// Per-invocation task tracking over a shared [`IncludePool`].
#[derive(Clone)]
pub struct Visitation {
    pool: IncludePool,
    shared: Arc<VisitationShared>,
}

impl Visitation {
    pub fn new(pool: IncludePool) -> Self {
        Self {
            pool,
            shared: Arc::new(VisitationShared {
                in_flight: Mutex::new(0),
                quiesced: Condvar::new(),
                failure: Mutex::new(None),
                panic: Mutex::new(None),
                failed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a unit of pending work not represented by a spawned
    /// task (e.g. a parse continuation). Must be balanced by [`exit`].
    ///
    /// [`exit`]: Visitation::exit
    pub fn enter(&self) {
        *self.shared.in_flight.lock().expect("visitation poisoned") += 1;
    }

    /// Balances [`enter`](Visitation::enter).
    pub fn exit(&self) {
        self.shared.leave();
    }

    /// True once any failure has been recorded.
    #[inline]
    pub fn failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Stores the first failure; later ones are dropped.
    pub fn record_failure(&self, err: ScanError) {
        self.shared.record(err);
    }

    /// Dispatches `f` to the pool. Dropped silently once the visitation
    /// has failed; queued bodies are also skipped after failure, but
    /// their accounting still drains through the quiescence barrier.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() -> Result<(), ScanError> + Send + 'static,
    {
        if self.failed() {
            return;
        }
        self.dispatch(f, true);
    }

    /// Like [`spawn`](Visitation::spawn), but immune to the fail-fast
    /// gate. For work owed to process-wide caches: a parse promise must
    /// complete even while this invocation is aborting, or another
    /// scanner sharing the cache would wait on it forever.
    pub fn spawn_always<F>(&self, f: F)
    where
        F: FnOnce() -> Result<(), ScanError> + Send + 'static,
    {
        self.dispatch(f, false);
    }

    fn dispatch<F>(&self, f: F, gated: bool)
    where
        F: FnOnce() -> Result<(), ScanError> + Send + 'static,
    {
        self.enter();
        let shared = self.shared.clone();
        self.pool.submit(Box::new(move || {
            if !gated || !shared.failed.load(Ordering::Acquire) {
                match panic::catch_unwind(AssertUnwindSafe(f)) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => shared.record(err),
                    Err(payload) => {
                        let mut slot = shared.panic.lock().expect("visitation poisoned");
                        if slot.is_none() {
                            *slot = Some(payload);
                        }
                        drop(slot);
                        shared.failed.store(true, Ordering::Release);
                    }
                }
            }
            shared.leave();
        }));
    }

    /// Blocks until all dispatched work and registered continuations
    /// have drained, then surfaces the first panic or failure.
    pub fn sync(&self) -> Result<(), ScanError> {
        let mut n = self.shared.in_flight.lock().expect("visitation poisoned");
        while *n > 0 {
            n = self
                .shared
                .quiesced
                .wait(n)
                .expect("visitation poisoned");
        }
        drop(n);
        if let Some(payload) = self.shared.panic.lock().expect("visitation poisoned").take() {
            panic::resume_unwind(payload);
        }
        match self.shared.failure.lock().expect("visitation poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
