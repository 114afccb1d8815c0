//! Resolution cache with illegal-output taint handling.
//!
//! Search-path resolution is expensive (one existence probe per entry),
//! and the same inclusion recurs across many files, so hits are memoized
//! per [`InclusionWithContext`]. One class of answer must not be: a miss
//! whose walk *observed* an undeclared output file. Such a miss is not
//! stable: the scanner is shared across actions, and a later action may
//! legally declare that very file. Memoizing it would wrongly hide
//! the header from that action.
//!
//! The lookup is two-phase:
//! 1. Full walk. Found, or a miss that never touched an undeclared
//!    output: cacheable, done.
//! 2. Tainted miss: re-walk checking *only* generated candidates. If
//!    that run finds a file or comes back untainted, the answer no
//!    longer depends on the unstable observation and is inserted;
//!    otherwise it is returned uncached.
//!
//! Concurrent lookups of one key may race the walk; the first inserted
//! result wins and every racer returns the winning value, keeping the
//! cache internally consistent.

use std::sync::Mutex;

use ahash::AHashMap;

use crate::artifact::LegalOutputMap;
use crate::inclusion::InclusionWithContext;
use crate::resolve::{LocateResult, Resolver};

/// Scanner-scoped cache of inclusion resolutions.
#[derive(Default)]
pub struct InclusionCache {
    map: Mutex<AHashMap<InclusionWithContext, LocateResult>>,
}

impl InclusionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves through the cache, never memoizing tainted misses.
    pub fn lookup(
        &self,
        resolver: &Resolver,
        inclusion: &InclusionWithContext,
        legal: &LegalOutputMap,
    ) -> LocateResult {
        if let Some(hit) = self
            .map
            .lock()
            .expect("inclusion cache poisoned")
            .get(inclusion)
        {
            return hit.clone();
        }

        let result = resolver.locate_on_paths(inclusion, legal, false);
        if result.is_found() || !result.viewed_illegal() {
            return self
                .map
                .lock()
                .expect("inclusion cache poisoned")
                .entry(inclusion.clone())
                .or_insert(result)
                .clone();
        }

        // Tainted miss. Re-run against generated candidates only; a
        // found file or a clean miss is stable and may be cached after
        // all. This is rare in practice.
        let result = resolver.locate_on_paths(inclusion, legal, true);
        if result.is_found() || !result.viewed_illegal() {
            self.map
                .lock()
                .expect("inclusion cache poisoned")
                .insert(inclusion.clone(), result.clone());
        } else {
            log::trace!(
                "not caching tainted miss for {}",
                inclusion.inclusion().path.display()
            );
        }
        result
    }

    #[cfg(test)]
    fn contains(&self, inclusion: &InclusionWithContext) -> bool {
        self.map
            .lock()
            .expect("inclusion cache poisoned")
            .contains_key(inclusion)
    }
}
