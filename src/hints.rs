//! Hinted inclusions.
//!
//! Hints inject implicit dependencies textual scanning cannot see:
//! path-level hints attach extra headers to whole search-path
//! directories (queried once per invocation, before traversal), and
//! file-level hints attach extra headers to individual artifacts
//! (followed transitively to a fixed point after the normal traversal
//! quiesces).
//!
//! The path-level query runs against the surrounding framework's value
//! store and may discover that upstream values are not computed yet; it
//! signals that through [`ScanEnv::values_missing`], which the scanner
//! turns into a missing-dependency failure before touching any caller
//! state.

use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::artifact::Artifact;

/// The surrounding framework's view of upstream values.
pub trait ScanEnv: Send + Sync {
    /// True when a value consulted during this invocation has not been
    /// computed yet; the invocation must restart after it is.
    fn values_missing(&self) -> bool;
}

/// Environment with every upstream value present. Suits standalone use
/// and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEnv;

impl ScanEnv for NullEnv {
    fn values_missing(&self) -> bool {
        false
    }
}

/// Hint database interface.
pub trait Hints: Send + Sync {
    /// Implicit headers for the given quote search path, deduplicated.
    /// May flip `env.values_missing()`.
    fn path_level_hinted_inclusions(
        &self,
        quote_paths: &[PathBuf],
        env: &dyn ScanEnv,
    ) -> Vec<Artifact>;

    /// Implicit headers to pull in whenever `include` is visited.
    fn file_level_hinted_inclusions(&self, include: &Artifact) -> Vec<Artifact>;
}

/// Table-backed hints: path-prefix rules and per-artifact rules.
#[derive(Default)]
pub struct StaticHints {
    path_rules: Vec<(PathBuf, Vec<Artifact>)>,
    file_rules: AHashMap<Artifact, Vec<Artifact>>,
}

impl StaticHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `hinted` to every search path under `prefix`.
    pub fn add_path_rule(&mut self, prefix: impl Into<PathBuf>, hinted: Vec<Artifact>) {
        self.path_rules.push((prefix.into(), hinted));
    }

    /// Attaches `hinted` to visits of `artifact`.
    pub fn add_file_rule(&mut self, artifact: Artifact, hinted: Vec<Artifact>) {
        self.file_rules.entry(artifact).or_default().extend(hinted);
    }
}

impl Hints for StaticHints {
    fn path_level_hinted_inclusions(
        &self,
        quote_paths: &[PathBuf],
        _env: &dyn ScanEnv,
    ) -> Vec<Artifact> {
        let mut out = Vec::new();
        for (prefix, hinted) in &self.path_rules {
            if quote_paths.iter().any(|p| matches_prefix(p, prefix)) {
                for artifact in hinted {
                    if !out.contains(artifact) {
                        out.push(artifact.clone());
                    }
                }
            }
        }
        out
    }

    fn file_level_hinted_inclusions(&self, include: &Artifact) -> Vec<Artifact> {
        self.file_rules.get(include).cloned().unwrap_or_default()
    }
}

fn matches_prefix(path: &Path, prefix: &Path) -> bool {
    path == prefix || path.starts_with(prefix)
}
