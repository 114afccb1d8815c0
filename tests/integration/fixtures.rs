//! On-disk scan fixtures: a temp exec root, real path cache, real
//! textual extractor.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use incscan::frag;
use incscan::{
    Artifact, ArtifactFactory, CancelToken, FsPathCache, HeaderData, IncludePool, IncludeScanner,
    IncludeSet, NullEnv, ScanContext, ScanError, ScanRequest, ScanStrategy, ScannerConfig,
    SourceRoot, StaticHints, TextIncludeParser,
};

/// Factory resolving every relative path as a source beneath the exec
/// root; mirrors a build where all packages are loaded.
pub struct ExecRootFactory {
    exec_root: SourceRoot,
    absolute_root: SourceRoot,
}

impl ExecRootFactory {
    pub fn new(exec_root: &Path) -> Self {
        Self {
            exec_root: SourceRoot::new(exec_root.to_path_buf()),
            absolute_root: SourceRoot::new(PathBuf::from("/")),
        }
    }
}

impl ArtifactFactory for ExecRootFactory {
    fn resolve_source_artifact(&self, exec_path: &Path) -> Option<Artifact> {
        Some(Artifact::source(
            exec_path.to_path_buf(),
            self.exec_root.clone(),
        ))
    }

    fn resolve_source_with_ancestor(
        &self,
        name: &Path,
        parent_dir: &Path,
        root: &SourceRoot,
    ) -> Option<Artifact> {
        let root_rel = frag::join_normalized(parent_dir, name);
        if frag::contains_uplevel(&root_rel) {
            return None;
        }
        Some(Artifact::new(root_rel.clone(), root_rel, root.clone(), true))
    }

    fn absolute_source_artifact(&self, exec_path: &Path) -> Artifact {
        Artifact::source(exec_path.to_path_buf(), self.absolute_root.clone())
    }
}

/// Temp exec root with an output tree, plus scanner construction.
pub struct Fixture {
    _tmp: TempDir,
    pub exec_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp exec root");
        let exec_root = tmp.path().to_path_buf();
        fs::create_dir_all(exec_root.join("bazel-out")).expect("create output tree");
        Self {
            _tmp: tmp,
            exec_root,
        }
    }

    /// Writes a file at the given exec path, creating parents.
    pub fn file(&self, exec_path: &str, contents: &str) -> &Self {
        let on_disk = self.exec_root.join(exec_path);
        if let Some(parent) = on_disk.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(on_disk, contents).expect("write fixture file");
        self
    }

    /// Source artifact beneath the exec root.
    pub fn artifact(&self, exec_path: &str) -> Artifact {
        Artifact::source(
            PathBuf::from(exec_path),
            SourceRoot::new(self.exec_root.clone()),
        )
    }

    /// Generated artifact; `root_rel` is the path beneath its output
    /// directory.
    pub fn generated(&self, exec_path: &str, root_rel: &str) -> Artifact {
        let exec = Path::new(exec_path);
        let peel = frag::segment_count(exec) - frag::segment_count(Path::new(root_rel));
        let root_dir = self.exec_root.join(frag::prefix(exec, peel));
        Artifact::new(
            exec.to_path_buf(),
            PathBuf::from(root_rel),
            SourceRoot::new(root_dir),
            false,
        )
    }

    pub fn scanner(
        &self,
        quote_dirs: &[&str],
        include_dirs: &[&str],
        strategy: ScanStrategy,
        hints: Option<StaticHints>,
    ) -> IncludeScanner {
        let mut parser = TextIncludeParser::new(self.exec_root.clone());
        if let Some(hints) = hints {
            parser = parser.with_hints(hints);
        }
        IncludeScanner::new(
            Arc::new(parser),
            IncludePool::new(4),
            Arc::new(incscan::FileParseCache::new()),
            Arc::new(FsPathCache::new(self.exec_root.clone())),
            Arc::new(ExecRootFactory::new(&self.exec_root)),
            ScannerConfig {
                exec_root: self.exec_root.clone(),
                output_path: self.exec_root.join("bazel-out"),
                quote_include_paths: quote_dirs.iter().map(PathBuf::from).collect(),
                include_paths: include_dirs.iter().map(PathBuf::from).collect(),
                strategy,
            },
        )
    }
}

pub struct ScanRun {
    pub includes: Arc<IncludeSet>,
    pub result: Result<(), ScanError>,
}

impl ScanRun {
    /// Panics with the scan error, if any.
    pub fn expect_ok(&self) {
        if let Err(err) = &self.result {
            panic!("scan failed: {err}");
        }
    }

    /// Exec paths of the discovered closure, sorted.
    pub fn paths(&self) -> BTreeSet<String> {
        self.includes
            .snapshot()
            .iter()
            .map(|a| a.exec_path().display().to_string())
            .collect()
    }
}

/// Runs one scan to completion.
pub fn scan(scanner: &IncludeScanner, request: ScanRequest) -> ScanRun {
    scan_with_cancel(scanner, request, CancelToken::new())
}

pub fn scan_with_cancel(
    scanner: &IncludeScanner,
    request: ScanRequest,
    cancel: CancelToken,
) -> ScanRun {
    let includes = Arc::new(IncludeSet::new());
    let mut ctx = ScanContext::new(Arc::new(NullEnv));
    ctx.cancel = cancel;
    let result = scanner.process(request, ctx, &includes);
    ScanRun { includes, result }
}

/// Request with the given sources and no extras.
pub fn request(sources: Vec<Artifact>) -> ScanRequest {
    ScanRequest {
        main_source: None,
        sources,
        header: HeaderData::default(),
        cmdline_includes: vec![],
    }
}

pub const BOTH_STRATEGIES: [ScanStrategy; 2] = [ScanStrategy::ForkJoin, ScanStrategy::Pipelined];
