//! Include resolution: relative lookup and search-path walking.
//!
//! Two resolution modes feed the traversal:
//!
//! - **Relative** (`locate_relative`): a `#include "x.h"` is first tried
//!   against the including file's own directory. The result depends on
//!   the includer, so it is never cached.
//! - **Search path** (`locate_on_paths`): walks the quote or angle list,
//!   returning the artifact *and* the 1-based entry position of the hit.
//!   That position becomes the starting point for any `#include_next`
//!   inside the found file. Position 0 is reserved for relative hits.
//!
//! # Correctness contract
//! - `#include_next` found at position `k` never considers entries
//!   `[0, k)` of its list.
//! - Candidates with uplevel segments are absorbed against the exec root
//!   where possible; candidates that still carry uplevels afterwards are
//!   skipped (Windows-separator debris on POSIX filesystems).
//! - A file found in an output directory but not declared as a legal
//!   output ends the search immediately: the remaining entries must not
//!   be consulted, and the miss is reported with the illegal observation
//!   so the cache layer can refuse to memoize it.
//! - Absolute hits still produce an artifact so their own inclusions can
//!   be scanned; rejecting absolute includes is the caller's policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::{Artifact, ArtifactFactory, LegalOutputMap};
use crate::classify::OutputClassifier;
use crate::frag;
use crate::inclusion::{IncludeKind, Inclusion, InclusionWithContext};
use crate::path_cache::PathExistence;

/// The two directive-flavor search lists.
///
/// The quote list is the angle list prefixed with the quote-only
/// entries: `-iquote` ++ `-I` ++ `-isystem` vs. `-I` ++ `-isystem`.
#[derive(Clone, Debug)]
pub struct SearchPaths {
    quote: Vec<PathBuf>,
    angle: Vec<PathBuf>,
}

impl SearchPaths {
    /// Builds both lists from the quote-only (`-iquote`) and shared
    /// (`-I`/`-isystem`, in order) directory lists.
    pub fn new(quote_dirs: Vec<PathBuf>, include_dirs: Vec<PathBuf>) -> Self {
        let mut quote = quote_dirs;
        quote.extend(include_dirs.iter().cloned());
        Self {
            quote,
            angle: include_dirs,
        }
    }

    #[inline]
    pub fn quote(&self) -> &[PathBuf] {
        &self.quote
    }

    #[inline]
    pub fn angle(&self) -> &[PathBuf] {
        &self.angle
    }
}

/// Outcome of a search-path walk.
#[derive(Clone, Debug, PartialEq)]
pub enum LocateResult {
    Found {
        artifact: Artifact,
        /// 1-based search-path position of the hit (0 is reserved for
        /// relative resolution and never produced here).
        include_pos: u32,
        viewed_illegal: bool,
    },
    NotFound {
        viewed_illegal: bool,
    },
}

impl LocateResult {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Whether the walk stepped past an undeclared output file.
    #[inline]
    pub fn viewed_illegal(&self) -> bool {
        match self {
            Self::Found { viewed_illegal, .. } | Self::NotFound { viewed_illegal } => {
                *viewed_illegal
            }
        }
    }
}

/// Stateless resolution over a fixed search-path configuration.
pub struct Resolver {
    exec_root: PathBuf,
    classifier: OutputClassifier,
    search: SearchPaths,
    factory: Arc<dyn ArtifactFactory>,
    path_cache: Arc<dyn PathExistence>,
}

impl Resolver {
    pub fn new(
        exec_root: PathBuf,
        classifier: OutputClassifier,
        search: SearchPaths,
        factory: Arc<dyn ArtifactFactory>,
        path_cache: Arc<dyn PathExistence>,
    ) -> Self {
        debug_assert!(exec_root.is_absolute(), "exec root must be absolute");
        Self {
            exec_root,
            classifier,
            search,
            factory,
            path_cache,
        }
    }

    #[inline]
    pub fn classifier(&self) -> &OutputClassifier {
        &self.classifier
    }

    #[inline]
    pub fn search(&self) -> &SearchPaths {
        &self.search
    }

    /// Locates an include relative to its including file. Only plain
    /// quote inclusions qualify: `#include_next` exists to continue on
    /// the search path and must not short-circuit back to the includer's
    /// directory. Never cached, because the answer depends on the
    /// includer.
    pub fn locate_relative(
        &self,
        inclusion: &Inclusion,
        legal: &LegalOutputMap,
        includer: &Artifact,
    ) -> Option<Artifact> {
        if inclusion.kind != IncludeKind::Quote {
            return None;
        }
        let name = &inclusion.path;
        let exec_path = frag::join_normalized(frag::parent_dir(includer.exec_path()), name);
        if !self.is_file(&exec_path, name, includer.is_source(), legal) {
            return None;
        }
        let parent_dir = frag::parent_dir(includer.root_rel());
        let root_rel = frag::join_normalized(parent_dir, name);
        if frag::contains_uplevel(&root_rel) {
            // An include must not escape its root through relative
            // resolution, nor leave and re-enter it.
            return None;
        }
        if let Some(artifact) = legal.get(&exec_path) {
            return Some(artifact.clone());
        }
        let resolved = self
            .factory
            .resolve_source_with_ancestor(name, parent_dir, includer.root());
        if resolved.is_none() {
            // Without uplevels in the written name the candidate shares
            // the includer's package and must have resolved.
            debug_assert!(
                frag::contains_uplevel(name),
                "unresolvable relative include without uplevels: {} from {}",
                name.display(),
                includer
            );
        }
        resolved
    }

    /// Walks the search path for an inclusion, honoring its context.
    ///
    /// With `only_check_generated`, entries whose candidate is not a
    /// real output file are skipped wholesale; the cache layer uses this
    /// to probe whether a tainted miss would survive without consulting
    /// the filesystem-backed part of the walk.
    pub fn locate_on_paths(
        &self,
        inclusion: &InclusionWithContext,
        legal: &LegalOutputMap,
        only_check_generated: bool,
    ) -> LocateResult {
        let name = &inclusion.inclusion().path;
        let start = if inclusion.inclusion().kind.is_next() {
            inclusion.context_pos().search_start()
        } else {
            0
        };
        let paths = if inclusion.context_kind() == IncludeKind::Quote {
            self.search.quote()
        } else {
            self.search.angle()
        };

        let mut viewed_illegal = false;
        for (i, entry) in paths.iter().enumerate().skip(start) {
            let mut candidate = frag::join_normalized(entry, name);
            if frag::contains_uplevel(&candidate) {
                // Escaped fragments usually come right back in: absorb
                // them against the exec root and keep the relative form
                // when they do.
                let abs = frag::join_normalized(&self.exec_root, &candidate);
                candidate = match abs.strip_prefix(&self.exec_root) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => abs,
                };
                if frag::contains_uplevel(&candidate) {
                    continue;
                }
            }
            if only_check_generated && !self.classifier.is_real_output_file(&candidate) {
                continue;
            }
            viewed_illegal =
                viewed_illegal || self.classifier.is_illegal_output_file(&candidate, legal);
            let in_output_dir = candidate.starts_with(self.classifier.output_prefix());
            if !self.is_file(&candidate, name, !in_output_dir, legal) {
                continue;
            }
            let artifact = if in_output_dir {
                match legal.get(&candidate) {
                    Some(artifact) => artifact.clone(),
                    None => {
                        // An existing file in an output directory that is
                        // not a declared output: an inc-library's output
                        // dir holding files the library no longer
                        // declares. Do not search further.
                        log::debug!(
                            "include {} matched undeclared output {}; ending search",
                            name.display(),
                            candidate.display()
                        );
                        return LocateResult::NotFound { viewed_illegal };
                    }
                }
            } else if !candidate.is_absolute() {
                match self.factory.resolve_source_artifact(&candidate) {
                    Some(artifact) => artifact,
                    // A real file whose package was not loaded this
                    // build; the action cannot reference it.
                    None => continue,
                }
            } else {
                self.factory.absolute_source_artifact(&candidate)
            };
            // +1: position 0 is the virtual entry for relative includes.
            return LocateResult::Found {
                artifact,
                include_pos: (i + 1) as u32,
                viewed_illegal,
            };
        }

        LocateResult::NotFound { viewed_illegal }
    }

    /// Existence check for a candidate exec path.
    ///
    /// Output-classified candidates exist iff declared legal. Source
    /// candidates that are relative and still end with the as-written
    /// name first verify each intermediate directory beneath the
    /// search-path prefix through the directory cache, pruning stats for
    /// deep include paths that share prefixes.
    pub(crate) fn is_file(
        &self,
        exec_path: &Path,
        name_as_written: &Path,
        is_source: bool,
        legal: &LegalOutputMap,
    ) -> bool {
        if self.classifier.is_real_output_file(exec_path) {
            return legal.contains_key(exec_path);
        }
        if is_source && !exec_path.is_absolute() && exec_path.ends_with(name_as_written) {
            let total = frag::segment_count(exec_path);
            let name_segs = frag::segment_count(name_as_written);
            for i in (total - name_segs + 1)..total {
                if !self.path_cache.directory_exists(&frag::prefix(exec_path, i)) {
                    return false;
                }
            }
        }
        self.path_cache.file_exists(exec_path, is_source)
    }
}
