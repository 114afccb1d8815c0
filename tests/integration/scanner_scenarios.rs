//! End-to-end scan scenarios over real files, run under both scheduling
//! strategies.

use std::path::PathBuf;
use std::sync::Arc;

use incscan::{
    HeaderData, IncludeSet, ScanContext, ScanEnv, ScanError, ScanRequest, StaticHints,
};

use crate::fixtures::{request, scan, Fixture, BOTH_STRATEGIES};

#[test]
fn quote_hit_on_first_search_path() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("src/a.cc", "#include \"lib/x.h\"\n")
            .file("lib/x.h", "// nothing\n");

        let scanner = fx.scanner(&["", "gen"], &[], strategy, None);
        let run = scan(&scanner, request(vec![fx.artifact("src/a.cc")]));
        run.expect_ok();
        assert_eq!(
            run.paths().into_iter().collect::<Vec<_>>(),
            vec!["lib/x.h".to_string(), "src/a.cc".to_string()],
            "strategy {strategy:?}"
        );
    }
}

#[test]
fn include_next_skips_earlier_entries() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include <v.h>\n")
            .file("inc1/v.h", "#include_next <v.h>\n")
            .file("inc2/v.h", "// terminal\n");

        let scanner = fx.scanner(&[], &["inc1", "inc2"], strategy, None);
        let run = scan(&scanner, request(vec![fx.artifact("a.cc")]));
        run.expect_ok();
        assert_eq!(
            run.paths().into_iter().collect::<Vec<_>>(),
            vec![
                "a.cc".to_string(),
                "inc1/v.h".to_string(),
                "inc2/v.h".to_string()
            ],
            "strategy {strategy:?}"
        );
    }
}

#[test]
fn undeclared_output_header_is_not_discovered() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"h.h\"\n")
            // Exists on disk inside the output tree, but no action
            // declares it: must resolve as not-found.
            .file("bazel-out/gen/h.h", "// stale output\n");

        let scanner = fx.scanner(&["bazel-out/gen"], &[], strategy, None);
        let run = scan(&scanner, request(vec![fx.artifact("a.cc")]));
        run.expect_ok();
        assert_eq!(
            run.paths().into_iter().collect::<Vec<_>>(),
            vec!["a.cc".to_string()],
            "strategy {strategy:?}"
        );
    }
}

#[test]
fn declared_output_header_is_discovered_and_parsed() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"g.h\"\n")
            .file("bazel-out/gen/g.h", "#include \"inner.h\"\n")
            .file("inner.h", "// leaf\n");

        let gen = fx.generated("bazel-out/gen/g.h", "g.h");
        let mut header = HeaderData::default();
        header
            .legal_outputs
            .insert(gen.exec_path().to_path_buf(), gen.clone());

        let scanner = fx.scanner(&["", "bazel-out/gen"], &[], strategy, None);
        let run = scan(
            &scanner,
            ScanRequest {
                main_source: None,
                sources: vec![fx.artifact("a.cc")],
                header,
                cmdline_includes: vec![],
            },
        );
        run.expect_ok();
        assert_eq!(
            run.paths().into_iter().collect::<Vec<_>>(),
            vec![
                "a.cc".to_string(),
                "bazel-out/gen/g.h".to_string(),
                "inner.h".to_string()
            ],
            "strategy {strategy:?}"
        );
    }
}

#[test]
fn modular_headers_stop_the_descent() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"mod.h\"\n")
            .file("mod.h", "#include \"deep.h\"\n")
            .file("deep.h", "// hidden behind the module\n");

        let mut header = HeaderData::default();
        header.modular_headers.insert(fx.artifact("mod.h"));

        let scanner = fx.scanner(&[""], &[], strategy, None);
        let run = scan(
            &scanner,
            ScanRequest {
                main_source: None,
                sources: vec![fx.artifact("a.cc")],
                header,
                cmdline_includes: vec![],
            },
        );
        run.expect_ok();
        assert_eq!(
            run.paths().into_iter().collect::<Vec<_>>(),
            vec!["a.cc".to_string(), "mod.h".to_string()],
            "strategy {strategy:?}"
        );
    }
}

#[test]
fn relative_resolution_wins_over_search_path() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("dir/a.cc", "#include \"x.h\"\n")
            .file("dir/x.h", "// sibling\n")
            .file("x.h", "// decoy at the search-path root\n");

        let scanner = fx.scanner(&[""], &[], strategy, None);
        let run = scan(&scanner, request(vec![fx.artifact("dir/a.cc")]));
        run.expect_ok();
        let paths = run.paths();
        assert!(paths.contains("dir/x.h"), "strategy {strategy:?}");
        assert!(!paths.contains("x.h"), "strategy {strategy:?}");
    }
}

#[test]
fn file_level_hints_reach_a_fixed_point() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"x.h\"\n")
            .file("x.h", "// hint chain head\n")
            .file("y.h", "// hinted once\n")
            .file("z.h", "// hinted twice\n");

        let mut hints = StaticHints::new();
        hints.add_file_rule(fx.artifact("x.h"), vec![fx.artifact("y.h")]);
        hints.add_file_rule(fx.artifact("y.h"), vec![fx.artifact("z.h")]);

        let scanner = fx.scanner(&[""], &[], strategy, Some(hints));
        let run = scan(&scanner, request(vec![fx.artifact("a.cc")]));
        run.expect_ok();
        let paths = run.paths();
        for expected in ["a.cc", "x.h", "y.h", "z.h"] {
            assert!(paths.contains(expected), "missing {expected} ({strategy:?})");
        }
    }
}

#[test]
fn path_level_hints_are_scanned() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "// no textual includes\n")
            .file("third_party/lib/implicit.h", "#include \"third_party/lib/detail.h\"\n")
            .file("third_party/lib/detail.h", "// pulled transitively\n");

        let mut hints = StaticHints::new();
        hints.add_path_rule(
            "third_party/lib",
            vec![fx.artifact("third_party/lib/implicit.h")],
        );

        let scanner = fx.scanner(&["third_party/lib", ""], &[], strategy, Some(hints));
        let run = scan(&scanner, request(vec![fx.artifact("a.cc")]));
        run.expect_ok();
        let paths = run.paths();
        for expected in ["a.cc", "third_party/lib/implicit.h", "third_party/lib/detail.h"] {
            assert!(paths.contains(expected), "missing {expected} ({strategy:?})");
        }
    }
}

#[test]
fn missing_dep_surfaces_before_any_population() {
    struct MissingEnv;
    impl ScanEnv for MissingEnv {
        fn values_missing(&self) -> bool {
            true
        }
    }

    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"x.h\"\n").file("x.h", "\n");

        let scanner = fx.scanner(&[""], &[], strategy, Some(StaticHints::new()));
        let includes = Arc::new(IncludeSet::new());
        let err = scanner
            .process(
                request(vec![fx.artifact("a.cc")]),
                ScanContext::new(Arc::new(MissingEnv)),
                &includes,
            )
            .unwrap_err();
        assert!(matches!(err, ScanError::MissingDep), "strategy {strategy:?}");
        assert!(includes.is_empty(), "strategy {strategy:?}");
    }
}

#[test]
fn cmdline_includes_are_scanned_against_the_main_source() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "// empty translation unit\n")
            .file("forced.h", "#include \"sub.h\"\n")
            .file("sub.h", "// forced transitively\n");

        let scanner = fx.scanner(&[""], &[], strategy, None);
        let run = scan(
            &scanner,
            ScanRequest {
                main_source: Some(fx.artifact("a.cc")),
                sources: vec![fx.artifact("a.cc")],
                header: HeaderData::default(),
                cmdline_includes: vec![PathBuf::from("forced.h")],
            },
        );
        run.expect_ok();
        let paths = run.paths();
        for expected in ["a.cc", "forced.h", "sub.h"] {
            assert!(paths.contains(expected), "missing {expected} ({strategy:?})");
        }
    }
}

#[test]
fn repeated_scans_return_the_same_closure() {
    let fx = Fixture::new();
    fx.file("a.cc", "#include \"b.h\"\n#include \"c.h\"\n#include <v.h>\n")
        .file("b.h", "#include \"d.h\"\n")
        .file("c.h", "#include \"d.h\"\n")
        .file("d.h", "#include \"b.h\"\n") // cycle back
        .file("sys/v.h", "// angle-resolved\n");

    let mut baseline: Option<Vec<String>> = None;
    for strategy in BOTH_STRATEGIES {
        for _ in 0..2 {
            let scanner = fx.scanner(&[""], &["sys"], strategy, None);
            let run = scan(&scanner, request(vec![fx.artifact("a.cc")]));
            run.expect_ok();
            let paths: Vec<String> = run.paths().into_iter().collect();
            match &baseline {
                Some(expected) => assert_eq!(&paths, expected, "strategy {strategy:?}"),
                None => baseline = Some(paths),
            }
        }
    }
    assert_eq!(
        baseline.unwrap(),
        vec!["a.cc", "b.h", "c.h", "d.h", "sys/v.h"]
    );
}

#[test]
fn cancellation_reports_operation_and_file() {
    use incscan::CancelToken;

    let fx = Fixture::new();
    fx.file("a.cc", "#include \"x.h\"\n").file("x.h", "\n");

    let scanner = fx.scanner(&[""], &[], incscan::ScanStrategy::ForkJoin, None);
    let cancel = CancelToken::new();
    cancel.cancel();
    let run = crate::fixtures::scan_with_cancel(
        &scanner,
        request(vec![fx.artifact("a.cc")]),
        cancel,
    );
    match run.result {
        Err(ScanError::Interrupted { op, .. }) => {
            assert!(op == "processing" || op == "visiting");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn sources_are_deduplicated_across_the_request() {
    for strategy in BOTH_STRATEGIES {
        let fx = Fixture::new();
        fx.file("a.cc", "#include \"x.h\"\n").file("x.h", "\n");

        let scanner = fx.scanner(&[""], &[], strategy, None);
        let run = scan(
            &scanner,
            request(vec![fx.artifact("a.cc"), fx.artifact("a.cc")]),
        );
        run.expect_ok();
        assert_eq!(run.paths().len(), 2, "strategy {strategy:?}");
    }
}
