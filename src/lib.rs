//! Transitive C/C++ include scanner for hermetic build input discovery.
//!
//! Quickly scans C/C++ sources to determine the bounding set of
//! transitively referenced include files, without running a real
//! preprocessor: textual `#include`/`#include_next` directives are
//! extracted per file, resolved against the configured search path, and
//! recursed into until the closure is complete. The result drives input
//! discovery for hermetic compilation, where inputs must be known before
//! the compiler runs.
//!
//! Preprocessor conditionals, macro-computed includes, and block
//! comments around directives are deliberately not evaluated: the
//! computed set over-approximates what any configuration of the
//! translation unit can include.
//!
//! # Module map
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`scanner`] | Traversal engine: dedup, modular pruning, hints, dual scheduling strategies |
//! | [`resolve`] | Relative and search-path resolution, `#include_next` semantics |
//! | [`inclusion_cache`] | Resolution memoization with illegal-output taint handling |
//! | [`parse`] | Shared per-file parse promises |
//! | [`textparse`] | In-process textual directive extractor |
//! | [`classify`] | Output-tree path classification |
//! | [`frag`] | Uplevel-aware logical path algebra |
//! | [`artifact`] | Artifact model and the artifact-factory seam |
//! | [`inclusion`] | Directive kinds and inclusion contexts |
//! | [`hints`] | Path-level and file-level hinted inclusions |
//! | [`path_cache`] | Memoizing path-existence probes |
//! | [`pool`] | Shared worker pool and per-invocation quiescence |
//! | [`cancel`] | Cooperative cancellation |
//! | [`rng`] | Deterministic shuffle for fan-out decorrelation |
//! | [`error`] | Error taxonomy |
//!
//! # Guarantees
//!
//! - The output set is identical for fixed inputs regardless of thread
//!   interleaving, worker count, or scheduling strategy.
//! - Each `(artifact, inclusion context)` pair is parsed and recursed
//!   on at most once per invocation.
//! - Undeclared output files never appear in the output set, and
//!   resolutions that observed one are never memoized.
//! - On failure, in-flight work is awaited before the error surfaces;
//!   no worker outlives a `process` call.

pub mod artifact;
pub mod cancel;
pub mod classify;
pub mod error;
pub mod frag;
pub mod hints;
pub mod inclusion;
pub mod inclusion_cache;
pub mod parse;
pub mod parser;
pub mod path_cache;
pub mod pool;
pub mod resolve;
pub mod rng;
pub mod scanner;
pub mod textparse;

pub use artifact::{Artifact, ArtifactFactory, LegalOutputMap, SourceRoot};
pub use cancel::CancelToken;
pub use error::ScanError;
pub use hints::{Hints, NullEnv, ScanEnv, StaticHints};
pub use inclusion::{ArtifactWithContext, ContextPos, IncludeKind, Inclusion, InclusionWithContext};
pub use parse::FileParseCache;
pub use parser::{IncludeParser, ScanContext};
pub use path_cache::{FsPathCache, PathExistence};
pub use pool::IncludePool;
pub use resolve::{LocateResult, SearchPaths};
pub use scanner::{
    HeaderData, IncludeScanner, IncludeSet, ScanRequest, ScanStrategy, ScannerConfig,
};
pub use textparse::TextIncludeParser;
