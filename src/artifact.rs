//! Artifact model and the artifact-factory seam.
//!
//! An [`Artifact`] is the build system's handle for a file: a source
//! file, a generated output, or an include-symlink-tree entry. Artifacts
//! are cheap to clone (`Arc`-shared) and compare by exec path only:
//! two handles for the same exec path are the same file regardless of
//! which lookup produced them.
//!
//! The [`ArtifactFactory`] trait is the seam to the surrounding build
//! system: resolution asks it to turn located exec paths back into
//! artifacts, and it may decline (a real file whose package was not
//! loaded this build is invisible to the action).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;

/// Declared outputs reachable by the current scan, keyed by exec path.
pub type LegalOutputMap = AHashMap<PathBuf, Artifact>;

/// The root directory an artifact's root-relative path hangs off.
///
/// For sources under the exec root this is the exec root itself; for
/// generated files it is their output directory; absolute includes get a
/// filesystem-root root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceRoot(Arc<PathBuf>);

impl SourceRoot {
    pub fn new(path: PathBuf) -> Self {
        Self(Arc::new(path))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug)]
struct ArtifactInner {
    exec_path: PathBuf,
    root_rel: PathBuf,
    root: SourceRoot,
    is_source: bool,
}

/// Shared, immutable handle for a file known to the build.
#[derive(Clone, Debug)]
pub struct Artifact(Arc<ArtifactInner>);

impl Artifact {
    /// Creates an artifact with an explicit root-relative path (for
    /// generated files, whose exec path carries the output prefix).
    pub fn new(exec_path: PathBuf, root_rel: PathBuf, root: SourceRoot, is_source: bool) -> Self {
        Self(Arc::new(ArtifactInner {
            exec_path,
            root_rel,
            root,
            is_source,
        }))
    }

    /// Creates a source artifact whose root-relative path equals its
    /// exec path (sources laid out directly under the exec root).
    pub fn source(exec_path: PathBuf, root: SourceRoot) -> Self {
        let root_rel = exec_path.clone();
        Self::new(exec_path, root_rel, root, true)
    }

    /// Path relative to the exec root (absolute for absolute-root
    /// artifacts).
    #[inline]
    pub fn exec_path(&self) -> &Path {
        &self.0.exec_path
    }

    /// Path relative to this artifact's root.
    #[inline]
    pub fn root_rel(&self) -> &Path {
        &self.0.root_rel
    }

    #[inline]
    pub fn root(&self) -> &SourceRoot {
        &self.0.root
    }

    /// True for source artifacts (not produced by an action).
    #[inline]
    pub fn is_source(&self) -> bool {
        self.0.is_source
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.exec_path == other.0.exec_path
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.exec_path.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.exec_path.display())
    }
}

/// Build-system seam resolving exec paths to artifacts.
///
/// Implementations must be consistent within one scan: repeated calls
/// with the same arguments return equal results.
pub trait ArtifactFactory: Send + Sync {
    /// Resolves a relative exec path to a source artifact in the main
    /// repository. `None` if the owning package was not loaded this
    /// build.
    fn resolve_source_artifact(&self, exec_path: &Path) -> Option<Artifact>;

    /// Resolves `name` against `parent_dir` under `root` (the including
    /// artifact's root). `None` if no package owns the result.
    fn resolve_source_with_ancestor(
        &self,
        name: &Path,
        parent_dir: &Path,
        root: &SourceRoot,
    ) -> Option<Artifact>;

    /// Wraps an absolute path as a source artifact under the absolute
    /// root. Always succeeds; the caller decides later whether absolute
    /// includes are acceptable.
    fn absolute_source_artifact(&self, exec_path: &Path) -> Artifact;
}
