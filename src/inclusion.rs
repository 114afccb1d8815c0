//! Inclusion directives and their resolution contexts.
//!
//! A bare [`Inclusion`] is what the extractor produces from one
//! `#include` line. Resolution and deduplication need more: how the
//! *including* file was itself found. `#include_next` continues the
//! search from the entry after the one that produced the includer, so
//! the same header behaves differently depending on where in the search
//! path it was entered. Contexts ride along in
//! [`InclusionWithContext`] (the resolution-cache key) and
//! [`ArtifactWithContext`] (the traversal dedup key).

use std::path::PathBuf;

use crate::artifact::Artifact;

/// Directive flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    /// `#include "name"`
    Quote,
    /// `#include <name>`
    Angle,
    /// `#include_next "name"`
    NextQuote,
    /// `#include_next <name>`
    NextAngle,
}

impl IncludeKind {
    /// True for `#include_next` flavors.
    #[inline]
    pub fn is_next(self) -> bool {
        matches!(self, Self::NextQuote | Self::NextAngle)
    }
}

/// One textual include directive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Inclusion {
    pub kind: IncludeKind,
    /// The path fragment as written between the delimiters.
    pub path: PathBuf,
}

impl Inclusion {
    pub fn new(kind: IncludeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Where the *current* file was found.
///
/// `Pos(0)` means "resolved relative to its includer"; `Pos(k)` with
/// `k >= 1` means "found at search-path entry `k - 1`" (positions are
/// 1-based so 0 can stand for relative). `TopLevel` marks files handed
/// to the scanner directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextPos {
    TopLevel,
    Pos(u32),
}

impl ContextPos {
    /// First search-path index an `#include_next` in this context
    /// considers. A 1-based hit position doubles as the 0-based index of
    /// the entry *after* the hit.
    #[inline]
    pub fn search_start(self) -> usize {
        match self {
            Self::TopLevel => 0,
            Self::Pos(k) => k as usize,
        }
    }
}

/// An inclusion plus the context of its including file.
///
/// Only `#include_next` flavors retain their context: a plain inclusion
/// resolves identically from every includer, so its context is dropped
/// on construction and cache keys unify across includers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InclusionWithContext {
    inclusion: Inclusion,
    ctx_kind: Option<IncludeKind>,
    ctx_pos: ContextPos,
}

impl InclusionWithContext {
    pub fn new(inclusion: Inclusion, ctx_pos: ContextPos, ctx_kind: Option<IncludeKind>) -> Self {
        if inclusion.kind.is_next() {
            Self {
                inclusion,
                ctx_kind,
                ctx_pos,
            }
        } else {
            Self {
                inclusion,
                ctx_kind: None,
                ctx_pos: ContextPos::TopLevel,
            }
        }
    }

    #[inline]
    pub fn inclusion(&self) -> &Inclusion {
        &self.inclusion
    }

    #[inline]
    pub fn context_pos(&self) -> ContextPos {
        self.ctx_pos
    }

    /// The flavor governing search-path selection: the includer's
    /// resolution flavor for `next` inclusions, the inclusion's own kind
    /// otherwise.
    #[inline]
    pub fn context_kind(&self) -> IncludeKind {
        self.ctx_kind.unwrap_or(self.inclusion.kind)
    }
}

/// Traversal dedup key: the artifact *and* the context it was reached
/// under. The triple, not the artifact alone, because a file re-entered
/// under a different context searches differently for its own
/// `#include_next`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactWithContext {
    pub artifact: Artifact,
    pub ctx_kind: Option<IncludeKind>,
    pub ctx_pos: ContextPos,
}
