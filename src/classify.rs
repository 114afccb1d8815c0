//! Output-path classification.
//!
//! Three disjoint flavors of exec path matter to resolution:
//! - plain source paths,
//! - *real* output paths (under the output prefix, produced by actions),
//! - include-symlink-tree paths (under `<output>/inc`), which live in the
//!   output tree but are treated as source-like: the symlink trees are
//!   populated up front, so their entries exist on disk and are stat'ed
//!   like sources instead of being checked against declared outputs.
//!
//! A *real* output path that is not declared as a legal output of the
//! current scan scope is "illegal": it may exist on disk as a stale or
//! foreign action output, so observing one makes the surrounding
//! resolution result unsafe to cache.

use std::path::{Path, PathBuf};

use crate::artifact::LegalOutputMap;

/// Directory under the output prefix holding include symlink trees.
const INC_TREE_SEGMENT: &str = "inc";

/// Classifies exec paths against the configured output tree.
#[derive(Clone, Debug)]
pub struct OutputClassifier {
    output_prefix: PathBuf,
    inc_root: PathBuf,
}

impl OutputClassifier {
    /// Creates a classifier for the given exec-root-relative output
    /// prefix (e.g. `bazel-out`).
    pub fn new(output_prefix: PathBuf) -> Self {
        let inc_root = output_prefix.join(INC_TREE_SEGMENT);
        Self {
            output_prefix,
            inc_root,
        }
    }

    /// The exec-root-relative output prefix.
    #[inline]
    pub fn output_prefix(&self) -> &Path {
        &self.output_prefix
    }

    /// True for paths under the output prefix that are not include
    /// symlink tree entries.
    #[inline]
    pub fn is_real_output_file(&self, path: &Path) -> bool {
        path.starts_with(&self.output_prefix) && !self.is_inc_path(path)
    }

    /// True for entries of an include symlink tree (strictly below the
    /// tree root).
    #[inline]
    pub fn is_inc_path(&self, path: &Path) -> bool {
        path.starts_with(&self.inc_root) && path != self.inc_root
    }

    /// True for real output paths not declared in `legal`.
    #[inline]
    pub fn is_illegal_output_file(&self, path: &Path, legal: &LegalOutputMap) -> bool {
        self.is_real_output_file(path) && !legal.contains_key(path)
    }
}
