//! Logical path fragment helpers.
//!
//! Include resolution works on *logical* paths: exec-root-relative (or
//! absolute) fragments that are compared and combined textually, never
//! stat'ed here. `std::path::Path::join` keeps `..` components verbatim,
//! but the resolution algorithm needs joins that absorb uplevels against
//! the base (`a/b` joined with `../c` is `a/c`, a leading `..` survives).
//! This module provides that algebra.
//!
//! # Contract
//! - `join_normalized` resolves `.` and interior `..` segments; only
//!   leading `..` segments remain in its output. Joining an absolute
//!   fragment replaces the base, like `PathBuf::push`.
//! - `..` at an absolute root collapses (`/` has no parent).
//! - Windows-style separators are not interpreted: a segment like
//!   `..\foo.h` is a single opaque component on POSIX, which is exactly
//!   the behavior resolution relies on when discarding such debris.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Returns true if the fragment contains any `..` component.
#[inline]
pub fn contains_uplevel(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

/// Parent directory of a fragment; the empty fragment for single-segment
/// relative paths.
#[inline]
pub fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

/// Joins `rel` onto `base`, resolving `.` and `..` segments.
///
/// Leading `..` segments that escape a relative base are retained; an
/// absolute base absorbs them at the root. An absolute `rel` replaces
/// `base` entirely.
pub fn join_normalized(base: &Path, rel: &Path) -> PathBuf {
    let mut absolute = false;
    let mut lead_ups = 0usize;
    let mut stack: Vec<OsString> = Vec::new();

    for part in [base, rel] {
        for component in part.components() {
            match component {
                Component::RootDir => {
                    absolute = true;
                    lead_ups = 0;
                    stack.clear();
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if stack.pop().is_none() && !absolute {
                        lead_ups += 1;
                    }
                }
                Component::Normal(seg) => stack.push(seg.to_os_string()),
                Component::Prefix(_) => {}
            }
        }
    }

    let mut out = PathBuf::new();
    if absolute {
        out.push("/");
    }
    for _ in 0..lead_ups {
        out.push("..");
    }
    for seg in stack {
        out.push(seg);
    }
    out
}

/// Normalizes a fragment in place (equivalent to joining it onto the
/// empty fragment).
#[inline]
pub fn normalize(path: &Path) -> PathBuf {
    join_normalized(Path::new(""), path)
}

/// Number of components in the fragment.
#[inline]
pub fn segment_count(path: &Path) -> usize {
    path.components().count()
}

/// The first `n` components of the fragment.
pub fn prefix(path: &Path, n: usize) -> PathBuf {
    path.components().take(n).collect()
}
