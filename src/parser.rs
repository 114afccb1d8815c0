//! The include-extraction seam.
//!
//! The scanner never reads file contents itself; an [`IncludeParser`]
//! turns one artifact into its list of textual inclusions. Parser
//! implementations decide *how*: the in-process extractor in
//! [`crate::textparse`] reads from disk, while a build-system
//! integration may shell out to a remote helper for generated files
//! (that is what `treat_as_generated` is for). The parser also owns the
//! hint database, if any.

use std::sync::Arc;

use crate::artifact::Artifact;
use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::hints::{Hints, ScanEnv};
use crate::inclusion::Inclusion;

/// Per-invocation services threaded through extraction.
#[derive(Clone)]
pub struct ScanContext {
    /// The surrounding framework's value store.
    pub env: Arc<dyn ScanEnv>,
    /// Helper artifact for parser implementations that grep remotely.
    pub grep_includes: Option<Artifact>,
    /// Cooperative cancellation for this invocation.
    pub cancel: CancelToken,
}

impl ScanContext {
    pub fn new(env: Arc<dyn ScanEnv>) -> Self {
        Self {
            env,
            grep_includes: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Extracts textual inclusions from one file.
pub trait IncludeParser: Send + Sync {
    /// Returns every `#include`/`#include_next` directive of `file`, in
    /// source order. `treat_as_generated` is true when `file` lives in
    /// the output tree and may need a different access path (e.g. a
    /// remote spawn).
    fn extract_inclusions(
        &self,
        file: &Artifact,
        ctx: &ScanContext,
        treat_as_generated: bool,
    ) -> Result<Vec<Inclusion>, ScanError>;

    /// The hint database, if this parser carries one.
    fn hints(&self) -> Option<&dyn Hints> {
        None
    }
}
