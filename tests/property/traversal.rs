//! Random include graphs: the scanned closure must equal graph
//! reachability, for every strategy and worker count.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;

use incscan::frag;
use incscan::{
    Artifact, ArtifactFactory, FileParseCache, FsPathCache, HeaderData, IncludePool,
    IncludeScanner, IncludeSet, NullEnv, ScanContext, ScanRequest, ScanStrategy, ScannerConfig,
    SourceRoot, TextIncludeParser,
};

struct AllLoadedFactory {
    exec_root: SourceRoot,
}

impl ArtifactFactory for AllLoadedFactory {
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
        Artifact::source(
            exec_path.to_path_buf(),
            SourceRoot::new(PathBuf::from("/")),
        )
    }
}

fn header_name(i: usize) -> String {
    format!("hdr{i}.h")
}

/// Writes one file per node; node `i` includes its adjacency targets.
fn write_graph(exec_root: &Path, adjacency: &[Vec<usize>]) {
    fs::create_dir_all(exec_root.join("bazel-out")).unwrap();
    for (i, edges) in adjacency.iter().enumerate() {
        let mut contents = String::new();
        for &j in edges {
            contents.push_str(&format!("#include \"{}\"\n", header_name(j)));
        }
        fs::write(exec_root.join(header_name(i)), contents).unwrap();
    }
}

/// Reachable node set from node 0, the source.
fn reachable(adjacency: &[Vec<usize>]) -> BTreeSet<String> {
    let mut seen = vec![false; adjacency.len()];
    let mut stack = vec![0usize];
    seen[0] = true;
    while let Some(node) = stack.pop() {
        for &next in &adjacency[node] {
            if !seen[next] {
                seen[next] = true;
                stack.push(next);
            }
        }
    }
    seen.iter()
        .enumerate()
        .filter(|(_, &s)| s)
        .map(|(i, _)| header_name(i))
        .collect()
}

fn scan_graph(
    exec_root: &Path,
    strategy: ScanStrategy,
    workers: usize,
) -> BTreeSet<String> {
    let scanner = IncludeScanner::new(
        Arc::new(TextIncludeParser::new(exec_root.to_path_buf())),
        IncludePool::new(workers),
        Arc::new(FileParseCache::new()),
        Arc::new(FsPathCache::new(exec_root.to_path_buf())),
        Arc::new(AllLoadedFactory {
            exec_root: SourceRoot::new(exec_root.to_path_buf()),
        }),
        ScannerConfig {
            exec_root: exec_root.to_path_buf(),
            output_path: exec_root.join("bazel-out"),
            quote_include_paths: vec![PathBuf::from("")],
            include_paths: vec![],
            strategy,
        },
    );
    let includes = Arc::new(IncludeSet::new());
    let source = Artifact::source(
        PathBuf::from(header_name(0)),
        SourceRoot::new(exec_root.to_path_buf()),
    );
    scanner
        .process(
            ScanRequest {
                main_source: None,
                sources: vec![source],
                header: HeaderData::default(),
                cmdline_includes: vec![],
            },
            ScanContext::new(Arc::new(NullEnv)),
            &includes,
        )
        .unwrap();
    includes
        .snapshot()
        .iter()
        .map(|a| a.exec_path().display().to_string())
        .collect()
}

fn adjacency_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(0..n, 0..=3), n)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        ..ProptestConfig::default()
    })]

    /// Closure == reachability, identically across strategies and
    /// worker counts; cycles and diamonds must terminate.
    #[test]
    fn closure_equals_reachability(adjacency in adjacency_strategy(7)) {
        let tmp = tempfile::tempdir().unwrap();
        write_graph(tmp.path(), &adjacency);
        let expected = reachable(&adjacency);

        for strategy in [ScanStrategy::ForkJoin, ScanStrategy::Pipelined] {
            for workers in [1, 4] {
                let got = scan_graph(tmp.path(), strategy, workers);
                prop_assert_eq!(
                    &got,
                    &expected,
                    "strategy {:?}, {} workers",
                    strategy,
                    workers
                );
            }
        }
    }
}
