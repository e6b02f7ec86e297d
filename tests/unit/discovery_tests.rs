//! Unit tests for test discovery and selection.

use std::fs;

use vim_harness::discovery::{discover, TestFilter};
use vim_harness::HarnessError;

fn touch(dir: &std::path::Path, name: &str) {
    fs::write(dir.join(name), "\" test\n").expect("write test file");
}

/// Matching files are returned as sorted stems; others are ignored.
#[test]
fn discovers_sorted_stems() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "test_hover.vim");
    touch(dir.path(), "test_goto.vim");
    touch(dir.path(), "helper.vim");
    touch(dir.path(), "test_notes.txt");
    fs::create_dir(dir.path().join("test_dir.vim")).expect("mkdir");

    let ids = discover(dir.path(), "test_*.vim").expect("discover");

    assert_eq!(ids, vec!["test_goto", "test_hover"]);
}

/// A missing directory is not an error.
#[test]
fn missing_directory_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ids = discover(&dir.path().join("absent"), "test_*.vim").expect("discover");
    assert!(ids.is_empty());
}

/// An invalid glob is a configuration error.
#[test]
fn invalid_pattern_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = discover(dir.path(), "test_[.vim").expect_err("must fail");
    assert!(matches!(err, HarnessError::Config(_)), "got {err}");
}

/// Explicit names take precedence over a substring filter.
#[test]
fn filter_from_args_precedence() {
    assert_eq!(
        TestFilter::from_args(vec!["a".into()], Some("b".into())),
        TestFilter::Names(vec!["a".into()])
    );
    assert_eq!(
        TestFilter::from_args(Vec::new(), Some("b".into())),
        TestFilter::Substring("b".into())
    );
    assert_eq!(TestFilter::from_args(Vec::new(), None), TestFilter::All);
}

/// Substring selection keeps discovery order; names are returned as given.
#[test]
fn filter_selection() {
    let discovered = vec![
        "test_completion".to_owned(),
        "test_goto".to_owned(),
        "test_goto_type".to_owned(),
    ];

    let by_substring = TestFilter::Substring("goto".into()).select(discovered.clone());
    assert_eq!(by_substring, vec!["test_goto", "test_goto_type"]);

    let by_name = TestFilter::Names(vec!["test_missing".into(), "test_goto".into()])
        .select(discovered.clone());
    assert_eq!(by_name, vec!["test_missing", "test_goto"]);

    assert_eq!(TestFilter::All.select(discovered.clone()), discovered);
}
