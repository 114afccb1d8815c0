//! The include scanner: concurrent DAG traversal with dual scheduling
//! strategies.
//!
//! # Overview
//!
//! One [`IncludeScanner`] is built per search-path configuration and
//! reused across actions. A `process` call walks the inclusion DAG of
//! the given sources to a fixed point:
//!
//! ```text
//! prepare (path-level hints; may fail with MissingDep)
//!   └─ cmdline -include args        (against the main source)   ⇒ sync
//!   └─ bulk sources                 (top-level context)         ⇒ sync
//!   └─ path hints + file hints      (for the original sources)  ⇒ sync
//!   └─ frontier loop                (file hints to fixed point)
//! ```
//!
//! Per file: parse (through the shared parse cache), shuffle the
//! inclusions deterministically, resolve each one (relative first, then
//! the cached search-path walk), gate on the `(artifact, context)`
//! dedup triple, stop at modular headers, recurse.
//!
//! # Scheduling strategies
//!
//! Both strategies share every piece of resolution, caching, and
//! deduplication logic; they differ only in how work is pipelined over
//! the shared pool:
//!
//! - [`ScanStrategy::ForkJoin`]: recursion on a not-yet-parsed file is
//!   dispatched to the pool; recursion on an already-parsed file runs
//!   inline, since scheduling overhead would exceed the saved latency.
//!   Parse waits block the worker.
//! - [`ScanStrategy::Pipelined`]: nothing blocks on a parse; fan-out is
//!   chained onto the parse promise as a continuation, and a failed
//!   parse is evicted from the shared cache so rewound re-executions
//!   can retry.
//!
//! # Correctness invariants
//!
//! - The output set is closed under inclusion restricted to found,
//!   legal, non-modular files, and is identical across strategies,
//!   worker counts, and interleavings.
//! - Each `(artifact, context kind, context position)` triple is
//!   recursed on at most once per invocation.
//! - Illegal outputs never enter the output set; observing one is not
//!   an error.
//! - The first failure short-circuits new work; in-flight work is
//!   awaited before the error surfaces.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ahash::AHashSet;

use crate::artifact::{Artifact, ArtifactFactory, LegalOutputMap};
use crate::classify::OutputClassifier;
use crate::error::ScanError;
use crate::hints::Hints;
use crate::inclusion::{
    ArtifactWithContext, ContextPos, IncludeKind, Inclusion, InclusionWithContext,
};
use crate::inclusion_cache::InclusionCache;
use crate::parse::{FileParseCache, ParsePromise, ParseResult};
use crate::parser::{IncludeParser, ScanContext};
use crate::path_cache::PathExistence;
use crate::pool::{IncludePool, Visitation};
use crate::resolve::{LocateResult, Resolver, SearchPaths};
use crate::rng::{hash_bytes, splitmix64, XorShift64};

/// Fixed shuffle seed: fan-out order is part of the reproducibility
/// contract. Mixed per call with the source path, so each file shuffles
/// the same way in every run regardless of thread timing.
const SHUFFLE_SEED: u64 = 88;

/// How recursion is pipelined over the shared pool.
///
/// Selection is per scanner, but scanners sharing one pool and parse
/// cache should agree on it: fork/join waiters rely on every pending
/// promise having a creator that is actively running, which holds
/// within either strategy alone but not when a pipelined scanner's
/// queued parse task sits behind blocked fork/join workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Blocking fork/join: dispatch unparsed files, run parsed ones
    /// inline, block on parse results.
    #[default]
    ForkJoin,
    /// Future-chaining: continuations on parse promises, no blocking
    /// waits, failed parses evicted for retry.
    Pipelined,
}

/// Immutable scanner configuration.
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// Absolute directory all action inputs are laid out under.
    pub exec_root: PathBuf,
    /// Absolute output directory, beneath the exec root.
    pub output_path: PathBuf,
    /// Quote-only search directories (`-iquote`), exec-root-relative.
    pub quote_include_paths: Vec<PathBuf>,
    /// Shared search directories (`-I` then `-isystem`), in order.
    pub include_paths: Vec<PathBuf>,
    /// Scheduling strategy, fixed for the scanner's lifetime.
    pub strategy: ScanStrategy,
}

impl ScannerConfig {
    /// Validates configuration invariants. Panics on violation.
    pub fn validate(&self) {
        assert!(self.exec_root.is_absolute(), "exec root must be absolute");
        assert!(
            self.output_path.starts_with(&self.exec_root) && self.output_path != self.exec_root,
            "output path must be strictly beneath the exec root"
        );
    }
}

/// Per-invocation header knowledge supplied by the caller.
#[derive(Default)]
pub struct HeaderData {
    /// Headers already accounted for by a precompiled module; traversal
    /// records them but never descends into them.
    pub modular_headers: AHashSet<Artifact>,
    /// Outputs of upstream actions reachable by this scan.
    pub legal_outputs: LegalOutputMap,
}

/// One `process` invocation's inputs.
pub struct ScanRequest {
    /// The main translation unit, if any; required for cmdline includes.
    pub main_source: Option<Artifact>,
    /// Top-level files to scan.
    pub sources: Vec<Artifact>,
    /// Modular headers and legal outputs for this invocation.
    pub header: HeaderData,
    /// `-include` arguments, processed as quote inclusions against the
    /// main source before anything else.
    pub cmdline_includes: Vec<PathBuf>,
}

/// Concurrent artifact set; `insert` novelty is the traversal gate.
#[derive(Default)]
pub struct IncludeSet {
    set: Mutex<AHashSet<Artifact>>,
}

impl IncludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts and reports novelty.
    pub fn insert(&self, artifact: Artifact) -> bool {
        self.set
            .lock()
            .expect("include set poisoned")
            .insert(artifact)
    }

    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.set
            .lock()
            .expect("include set poisoned")
            .contains(artifact)
    }

    pub fn len(&self) -> usize {
        self.set.lock().expect("include set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.set
            .lock()
            .expect("include set poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

struct ScannerInner {
    parser: Arc<dyn IncludeParser>,
    pool: IncludePool,
    parse_cache: Arc<FileParseCache>,
    resolver: Resolver,
    inclusion_cache: InclusionCache,
    strategy: ScanStrategy,
}

/// Transitive include scanner over a fixed search-path configuration.
///
/// Cloning is cheap and yields a handle to the same scanner; the
/// resolution cache is shared, the parse cache is shared even across
/// scanners.
#[derive(Clone)]
pub struct IncludeScanner {
    inner: Arc<ScannerInner>,
}

impl IncludeScanner {
    pub fn new(
        parser: Arc<dyn IncludeParser>,
        pool: IncludePool,
        parse_cache: Arc<FileParseCache>,
        path_cache: Arc<dyn PathExistence>,
        factory: Arc<dyn ArtifactFactory>,
        config: ScannerConfig,
    ) -> Self {
        config.validate();
        let output_prefix = config
            .output_path
            .strip_prefix(&config.exec_root)
            .expect("output path must be beneath the exec root")
            .to_path_buf();
        let resolver = Resolver::new(
            config.exec_root,
            OutputClassifier::new(output_prefix),
            SearchPaths::new(config.quote_include_paths, config.include_paths),
            factory,
            path_cache,
        );
        Self {
            inner: Arc::new(ScannerInner {
                parser,
                pool,
                parse_cache,
                resolver,
                inclusion_cache: InclusionCache::new(),
                strategy: config.strategy,
            }),
        }
    }

    /// Walks the inclusion DAG of `request` to its fixed point,
    /// populating `includes` with the transitive closure of discovered
    /// headers (exclusive of modular tails and illegal outputs).
    ///
    /// Completes when the DAG is fully walked or the first error
    /// surfaces; either way, no worker outlives the call.
    pub fn process(
        &self,
        request: ScanRequest,
        ctx: ScanContext,
        includes: &Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        let path_hints = self.prepare(&ctx)?;
        log::debug!(
            "include scan: {} sources, {} path hints",
            request.sources.len(),
            path_hints.len()
        );
        let visit = Visit {
            state: Arc::new(VisitState {
                core: self.inner.clone(),
                request,
                ctx,
                visitation: Visitation::new(self.inner.pool.clone()),
                visited_inclusions: Mutex::new(AHashSet::new()),
            }),
        };
        visit.run(&path_hints, includes)
    }

    /// Queries path-level hints up front. Failing here, before any
    /// traversal, guarantees a missing-dep restart sees no partial
    /// population of caller-visible sets.
    fn prepare(&self, ctx: &ScanContext) -> Result<Vec<Artifact>, ScanError> {
        match self.inner.parser.hints() {
            Some(hints) => {
                let artifacts = hints
                    .path_level_hinted_inclusions(self.inner.resolver.search().quote(), ctx.env.as_ref());
                if ctx.env.values_missing() {
                    return Err(ScanError::MissingDep);
                }
                Ok(artifacts)
            }
            None => Ok(Vec::new()),
        }
    }
}

struct VisitState {
    core: Arc<ScannerInner>,
    request: ScanRequest,
    ctx: ScanContext,
    visitation: Visitation,
    visited_inclusions: Mutex<AHashSet<ArtifactWithContext>>,
}

/// Cheap-clone handle on one invocation's traversal state; clones ride
/// into pool tasks and parse continuations.
#[derive(Clone)]
struct Visit {
    state: Arc<VisitState>,
}

impl Visit {
    fn run(&self, path_hints: &[Artifact], includes: &Arc<IncludeSet>) -> Result<(), ScanError> {
        match self.phases(path_hints, includes) {
            Ok(()) => self.state.visitation.sync(),
            Err(err) => {
                // A caller-thread error must not leak visitation tasks:
                // funnel it, await quiescence, then surface the first
                // recorded failure.
                self.state.visitation.record_failure(err);
                self.state.visitation.sync()
            }
        }
    }

    fn phases(&self, path_hints: &[Artifact], includes: &Arc<IncludeSet>) -> Result<(), ScanError> {
        let st = &self.state;

        if let Some(main) = &st.request.main_source {
            if !st.request.cmdline_includes.is_empty() {
                for name in &st.request.cmdline_includes {
                    let inclusion = Inclusion::new(IncludeKind::Quote, name.clone());
                    self.find_and_process(
                        InclusionWithContext::new(inclusion, ContextPos::TopLevel, None),
                        main,
                        includes,
                    )?;
                }
                st.visitation.sync()?;
            }
        }

        self.process_bulk(&st.request.sources, includes)?;
        st.visitation.sync()?;

        if let Some(hints) = st.core.parser.hints() {
            self.process_bulk(path_hints, includes)?;
            for source in &st.request.sources {
                self.process_file_level_hints(hints, source, includes)?;
            }
            st.visitation.sync()?;

            // Follow file-level hints of everything discovered so far,
            // transitively: each pass expands the frontier's hints into
            // a fresh set, keeps the novel artifacts, and repeats until
            // a pass discovers nothing.
            let mut frontier = includes.snapshot();
            while !frontier.is_empty() {
                let adjacent = Arc::new(IncludeSet::new());
                for include in &frontier {
                    self.process_file_level_hints(hints, include, &adjacent)?;
                }
                st.visitation.sync()?;
                frontier = adjacent
                    .snapshot()
                    .into_iter()
                    .filter(|artifact| includes.insert(artifact.clone()))
                    .collect();
            }
        }
        Ok(())
    }

    /// Scans a batch of top-level files into `visited`.
    fn process_bulk(&self, sources: &[Artifact], visited: &Arc<IncludeSet>) -> Result<(), ScanError> {
        for source in sources {
            // TODO: gate bulk entries on visited_inclusions instead;
            // pre-adding the artifact here can over-prune when the same
            // file is later reached as an included header under a real
            // context.
            if !visited.insert(source.clone()) {
                continue;
            }
            self.schedule(source.clone(), ContextPos::TopLevel, None, visited.clone())?;
        }
        Ok(())
    }

    /// Dispatches recursion on `source` per the configured strategy.
    fn schedule(
        &self,
        source: Artifact,
        ctx_pos: ContextPos,
        ctx_kind: Option<IncludeKind>,
        visited: Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        match self.state.core.strategy {
            ScanStrategy::ForkJoin => {
                if self.state.core.parse_cache.get(&source).is_some() {
                    // Parsed (or in flight): recursing inline beats the
                    // scheduling overhead of another dispatch.
                    self.process_source_forkjoin(&source, ctx_pos, ctx_kind, &visited)
                } else {
                    let visit = self.clone();
                    self.state.visitation.spawn(move || {
                        visit.process_source_forkjoin(&source, ctx_pos, ctx_kind, &visited)
                    });
                    Ok(())
                }
            }
            ScanStrategy::Pipelined => {
                self.process_source_pipelined(source, ctx_pos, ctx_kind, visited)
            }
        }
    }

    /// Parses `source` (blocking on the shared promise if another
    /// traversal got there first) and fans out its inclusions.
    fn process_source_forkjoin(
        &self,
        source: &Artifact,
        ctx_pos: ContextPos,
        ctx_kind: Option<IncludeKind>,
        visited: &Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        self.state.ctx.cancel.check("processing", source.exec_path())?;
        let (promise, creator) = self.state.core.parse_cache.get_or_insert(source);
        let result = if creator {
            self.parse_and_publish(source, &promise)
        } else {
            promise.wait()
        };
        match result.as_ref() {
            Ok(inclusions) => self.fan_out(source, ctx_pos, ctx_kind, inclusions, visited),
            Err(err) => Err(err.clone()),
        }
    }

    /// Non-blocking variant: the parse runs as its own task and fan-out
    /// is chained onto the promise as a continuation.
    fn process_source_pipelined(
        &self,
        source: Artifact,
        ctx_pos: ContextPos,
        ctx_kind: Option<IncludeKind>,
        visited: Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        self.state.ctx.cancel.check("processing", source.exec_path())?;
        let (promise, creator) = self.state.core.parse_cache.get_or_insert(&source);
        if creator {
            let visit = self.clone();
            let file = source.clone();
            let slot = promise.clone();
            // spawn_always: the promise is owed to the shared cache and
            // must complete even if this visitation is failing fast.
            self.state.visitation.spawn_always(move || {
                visit.parse_and_publish(&file, &slot);
                Ok(())
            });
        }

        // The continuation is pending work the quiescence barrier must
        // see even before any task exists for it.
        self.state.visitation.enter();
        let visit = self.clone();
        promise.when_ready(Box::new(move |result| {
            match result.as_ref() {
                Ok(_) => {
                    let chained = visit.clone();
                    let result = result.clone();
                    visit.state.visitation.spawn(move || {
                        let inclusions = match result.as_ref() {
                            Ok(inclusions) => inclusions,
                            Err(_) => return Ok(()),
                        };
                        chained.fan_out(&source, ctx_pos, ctx_kind, inclusions, &visited)
                    });
                }
                Err(err) => visit.state.visitation.record_failure(err.clone()),
            }
            visit.state.visitation.exit();
        }));
        Ok(())
    }

    fn extract(&self, source: &Artifact) -> Result<Vec<Inclusion>, ScanError> {
        let core = &self.state.core;
        core.parser.extract_inclusions(
            source,
            &self.state.ctx,
            core.resolver
                .classifier()
                .is_real_output_file(source.exec_path()),
        )
    }

    /// Runs the extraction and publishes its result, completing the
    /// promise on every path. A promise left pending would hang other
    /// scanners sharing the parse cache; failures (and panics) are
    /// evicted first so a rewound re-execution re-parses instead of
    /// replaying them.
    fn parse_and_publish(&self, source: &Artifact, promise: &Arc<ParsePromise>) -> ParseResult {
        let result: ParseResult = match panic::catch_unwind(AssertUnwindSafe(|| self.extract(source)))
        {
            Ok(parsed) => Arc::new(parsed),
            Err(payload) => {
                self.state.core.parse_cache.evict(source);
                promise.complete(Arc::new(Err(ScanError::exec(format!(
                    "include extraction panicked for {source}"
                )))));
                panic::resume_unwind(payload);
            }
        };
        if result.is_err() {
            self.state.core.parse_cache.evict(source);
        }
        promise.complete(result.clone());
        result
    }

    /// Shuffles `source`'s inclusions deterministically and resolves
    /// each one. The shuffle decorrelates sibling fan-out across
    /// workers; the per-path seed keeps it reproducible.
    fn fan_out(
        &self,
        source: &Artifact,
        ctx_pos: ContextPos,
        ctx_kind: Option<IncludeKind>,
        inclusions: &[Inclusion],
        visited: &Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        let mut shuffled = inclusions.to_vec();
        let salt = hash_bytes(source.exec_path().as_os_str().as_encoded_bytes());
        XorShift64::new(splitmix64(SHUFFLE_SEED ^ salt)).shuffle(&mut shuffled);
        for inclusion in shuffled {
            self.find_and_process(
                InclusionWithContext::new(inclusion, ctx_pos, ctx_kind),
                source,
                visited,
            )?;
        }
        Ok(())
    }

    /// Resolves one inclusion and recurses into the hit if it is legal
    /// and novel under its context.
    fn find_and_process(
        &self,
        inclusion: InclusionWithContext,
        source: &Artifact,
        visited: &Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        let st = &self.state;
        let legal = &st.request.header.legal_outputs;

        // Relative resolution acts as a virtual first entry of the
        // quote list; a hit gets position 0 and no context kind.
        let relative = st
            .core
            .resolver
            .locate_relative(inclusion.inclusion(), legal, source);

        st.ctx.cancel.check("visiting", source.exec_path())?;

        let (file, ctx_pos, ctx_kind) = match relative {
            Some(file) => (file, ContextPos::Pos(0), None),
            None => match st
                .core
                .inclusion_cache
                .lookup(&st.core.resolver, &inclusion, legal)
            {
                LocateResult::Found {
                    artifact,
                    include_pos,
                    ..
                } => (
                    artifact,
                    ContextPos::Pos(include_pos),
                    Some(inclusion.context_kind()),
                ),
                LocateResult::NotFound { .. } => return Ok(()),
            },
        };

        if st
            .core
            .resolver
            .classifier()
            .is_illegal_output_file(file.exec_path(), legal)
        {
            return Ok(());
        }
        let novel = st
            .visited_inclusions
            .lock()
            .expect("visited inclusions poisoned")
            .insert(ArtifactWithContext {
                artifact: file.clone(),
                ctx_kind,
                ctx_pos,
            });
        if !novel {
            return Ok(());
        }
        visited.insert(file.clone());
        if st.request.header.modular_headers.contains(&file) {
            // The module that owns this header accounts for its tail.
            return Ok(());
        }
        self.schedule(file, ctx_pos, ctx_kind, visited.clone())
    }

    /// Expands file-level hints of `include` into `also_visited`.
    fn process_file_level_hints(
        &self,
        hints: &dyn Hints,
        include: &Artifact,
        also_visited: &Arc<IncludeSet>,
    ) -> Result<(), ScanError> {
        let hinted = hints.file_level_hinted_inclusions(include);
        if hinted.is_empty() {
            // Skip enqueuing a no-op closure.
            return Ok(());
        }
        match self.state.core.strategy {
            ScanStrategy::ForkJoin => {
                let visit = self.clone();
                let visited = also_visited.clone();
                self.state
                    .visitation
                    .spawn(move || visit.process_bulk(&hinted, &visited));
                Ok(())
            }
            ScanStrategy::Pipelined => self.process_bulk(&hinted, also_visited),
        }
    }
}
