//! Shared file-parse cache.
//!
//! Parsing a file for its inclusions happens at most once per process,
//! no matter how many scanners or how many traversal paths reach it.
//! The cache maps each artifact to a [`ParsePromise`]: exactly one
//! caller wins the insert race and becomes the *creator* responsible
//! for running the extraction and completing the promise; everyone else
//! either blocks on it (fork/join traversal) or registers a
//! continuation (future-chaining traversal).
//!
//! Failed promises are evicted so a rewound re-execution can retry the
//! extraction instead of replaying a stale failure. Eviction happens
//! before the failure is published, so no new reader can pick up the
//! doomed promise after it becomes observable.

use std::sync::{Arc, Condvar, Mutex};

use ahash::AHashMap;

use crate::artifact::Artifact;
use crate::error::ScanError;
use crate::inclusion::Inclusion;

/// Shared outcome of parsing one file.
pub type ParseResult = Arc<Result<Vec<Inclusion>, ScanError>>;

type Continuation = Box<dyn FnOnce(&ParseResult) + Send>;

enum PromiseState {
    Pending(Vec<Continuation>),
    Ready(ParseResult),
}

/// Single-assignment parse slot with blocking and chaining consumers.
pub struct ParsePromise {
    state: Mutex<PromiseState>,
    ready: Condvar,
}

impl ParsePromise {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PromiseState::Pending(Vec::new())),
            ready: Condvar::new(),
        })
    }

    /// Publishes the result, waking blocked waiters and running every
    /// registered continuation on the completing thread.
    pub fn complete(&self, result: ParseResult) {
        let waiters = {
            let mut state = self.state.lock().expect("parse promise poisoned");
            match std::mem::replace(&mut *state, PromiseState::Ready(result.clone())) {
                PromiseState::Pending(waiters) => waiters,
                PromiseState::Ready(prev) => {
                    debug_assert!(false, "parse promise completed twice");
                    *state = PromiseState::Ready(prev);
                    return;
                }
            }
        };
        self.ready.notify_all();
        for waiter in waiters {
            waiter(&result);
        }
    }

    /// Blocks until the promise is complete.
    pub fn wait(&self) -> ParseResult {
        let mut state = self.state.lock().expect("parse promise poisoned");
        loop {
            match &*state {
                PromiseState::Ready(result) => return result.clone(),
                PromiseState::Pending(_) => {
                    state = self.ready.wait(state).expect("parse promise poisoned");
                }
            }
        }
    }

    /// Runs `f` when the promise completes: immediately on this thread
    /// if it already has, otherwise on the completing thread.
    pub fn when_ready(&self, f: Continuation) {
        let mut state = self.state.lock().expect("parse promise poisoned");
        match &mut *state {
            PromiseState::Ready(result) => {
                let result = result.clone();
                drop(state);
                f(&result);
            }
            PromiseState::Pending(waiters) => waiters.push(f),
        }
    }
}

/// Process-wide `artifact → parse promise` map, shared across scanners.
#[derive(Default)]
pub struct FileParseCache {
    map: Mutex<AHashMap<Artifact, Arc<ParsePromise>>>,
}

impl FileParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The promise for `file`, if one exists (pending or complete).
    pub fn get(&self, file: &Artifact) -> Option<Arc<ParsePromise>> {
        self.map
            .lock()
            .expect("parse cache poisoned")
            .get(file)
            .cloned()
    }

    /// Returns the promise for `file` and whether this caller created
    /// it (and therefore owes it a `complete`).
    pub fn get_or_insert(&self, file: &Artifact) -> (Arc<ParsePromise>, bool) {
        let mut map = self.map.lock().expect("parse cache poisoned");
        if let Some(existing) = map.get(file) {
            return (existing.clone(), false);
        }
        let promise = ParsePromise::new();
        map.insert(file.clone(), promise.clone());
        (promise, true)
    }

    /// Drops the promise for `file` so a later lookup re-parses.
    pub fn evict(&self, file: &Artifact) {
        self.map.lock().expect("parse cache poisoned").remove(file);
    }
}
