//! Unit tests for the two-tier output parser.

use std::time::Duration;

use vim_harness::config::ParserConfig;
use vim_harness::models::{ResultSource, TestStatus};
use vim_harness::parser::{OutputParser, ResultStrategy, TokenCount};

const OBSERVED: Duration = Duration::from_millis(1500);

fn parser() -> OutputParser {
    OutputParser::with_defaults().expect("default parser")
}

/// A marker line wins over any tokens in the surrounding text.
#[test]
fn marker_payload_is_authoritative() {
    let raw = "[FAIL] noise\n::YAC_TEST_RESULT::{\"suite\":\"goto\",\"passed\":3,\"failed\":0,\"duration\":0.5,\"success\":true}\n";

    let result = parser().parse("test_goto", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!(result.suite, "goto");
    assert_eq!((result.passed, result.failed, result.skipped), (3, 0, 0));
    assert_eq!(result.duration, Duration::from_millis(500));
    assert!(result.success);
    assert_eq!(result.output, raw, "raw text is kept");
}

/// Counts come from the test list when one is present.
#[test]
fn test_list_overrides_payload_counts() {
    let raw = r#"::YAC_TEST_RESULT::{"tests":[{"name":"a","status":"pass"},{"name":"b","status":"fail","reason":"boom"},{"name":"c","status":"skip"}],"passed":10,"success":false}"#;

    let result = parser().parse("test_list", raw, OBSERVED);

    assert_eq!((result.passed, result.failed, result.skipped), (1, 1, 1));
    assert_eq!(result.tests.len(), 3);
    assert_eq!(result.tests[1].reason.as_deref(), Some("boom"));
}

/// `error` is read as a failure and a missing reason is filled in.
#[test]
fn error_status_maps_to_fail_with_reason() {
    let raw = r#"::YAC_TEST_RESULT::{"tests":[{"name":"x","status":"error"}]}"#;

    let result = parser().parse("test_err", raw, OBSERVED);

    assert_eq!(result.tests[0].status, TestStatus::Fail);
    assert!(result.tests[0].reason.is_some(), "failed outcome needs a reason");
}

/// Absent fields take defaults: suite from the id, duration from the
/// observed time, success false.
#[test]
fn payload_defaults_apply() {
    let result = parser().parse("test_empty", "::YAC_TEST_RESULT::{}", OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!(result.suite, "test_empty");
    assert_eq!(result.duration, OBSERVED);
    assert!(!result.success, "success defaults to false");
}

/// Only the first marker line is considered.
#[test]
fn first_marker_line_wins() {
    let raw = "::YAC_TEST_RESULT::{\"passed\":1,\"success\":true}\n::YAC_TEST_RESULT::{\"failed\":9}\n";

    let result = parser().parse("test_twice", raw, OBSERVED);

    assert_eq!((result.passed, result.failed), (1, 0));
}

/// A malformed payload falls through to the token heuristic.
#[test]
fn malformed_marker_falls_back_to_tokens() {
    let raw = "::YAC_TEST_RESULT::{oops\n[PASS] one\n[PASS] two\n";

    let result = parser().parse("test_bad", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Heuristic);
    assert_eq!((result.passed, result.failed), (2, 0));
    assert!(result.success);
}

/// A JSON payload that is not an object is not authoritative.
#[test]
fn non_object_payload_falls_back() {
    let result = parser().parse("test_arr", "::YAC_TEST_RESULT::[1,2]", OBSERVED);
    assert_eq!(result.source, ResultSource::Heuristic);
}

/// A failing payload stays authoritative and failing even when its test
/// list is null and the surrounding text only shows passes.
#[test]
fn null_test_list_keeps_failing_payload_authoritative() {
    let raw = "[PASS] x\n::YAC_TEST_RESULT::{\"suite\":\"x\",\"passed\":3,\"failed\":1,\"duration\":0.5,\"success\":false,\"tests\":null}\n";

    let result = parser().parse("test_x", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!((result.passed, result.failed), (3, 1));
    assert!(result.tests.is_empty());
    assert!(!result.success);
}

/// A test list of the wrong type is ignored; the counts still apply.
#[test]
fn non_list_tests_field_is_ignored() {
    let raw = r#"::YAC_TEST_RESULT::{"tests":"all good","failed":2,"success":false}"#;

    let result = parser().parse("test_str", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!(result.failed, 2);
    assert!(result.tests.is_empty());
}

/// Status words are matched without regard to case; unknown or missing
/// ones become failures that name the raw value.
#[test]
fn unrecognised_status_is_a_failure() {
    let raw = r#"::YAC_TEST_RESULT::{"tests":[{"name":"a","status":"PASS"},{"name":"b","status":"flaky"},{"name":"c"},{"name":"d","status":"Skip"}],"success":false}"#;

    let result = parser().parse("test_status", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!((result.passed, result.failed, result.skipped), (1, 2, 1));
    assert_eq!(result.tests[0].status, TestStatus::Pass);
    assert_eq!(result.tests[1].status, TestStatus::Fail);
    let reason = result.tests[1].reason.as_deref().expect("reason");
    assert!(reason.contains("\"flaky\""), "raw status in reason: {reason}");
    assert!(
        result.tests[2]
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("missing")),
        "missing status is named"
    );
}

/// Entries that are not objects count as failures instead of vanishing.
#[test]
fn non_object_test_entry_is_a_failure() {
    let raw = r#"::YAC_TEST_RESULT::{"tests":[{"name":"a","status":"pass"},42],"success":true}"#;

    let result = parser().parse("test_entry", raw, OBSERVED);

    assert_eq!((result.passed, result.failed), (1, 1));
    assert_eq!(result.tests[1].name, "test #2");
    assert_eq!(result.tests[1].status, TestStatus::Fail);
}

/// Counts written as integral floats are read as whole numbers; fractional
/// or negative ones are ignored.
#[test]
fn integral_float_counts_are_accepted() {
    let raw = r#"::YAC_TEST_RESULT::{"passed":3.0,"failed":1.5,"skipped":-1,"success":false}"#;

    let result = parser().parse("test_float", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert_eq!((result.passed, result.failed, result.skipped), (3, 0, 0));
    assert!(!result.success);
}

/// A `success` that is not a boolean reads as false rather than dropping
/// the payload.
#[test]
fn non_boolean_success_is_false() {
    let raw = "[PASS] a\n::YAC_TEST_RESULT::{\"passed\":1,\"success\":\"yes\"}";

    let result = parser().parse("test_bool", raw, OBSERVED);

    assert_eq!(result.source, ResultSource::Authoritative);
    assert!(!result.success);
}

/// Heuristic success requires at least one pass and no failures.
#[test]
fn heuristic_success_rule() {
    let cases = [
        ("[PASS] a [PASS] b", 2, 0, true),
        ("[PASS] a [FAIL] b", 1, 1, false),
        ("nothing recognisable", 0, 0, false),
    ];
    for (raw, passed, failed, success) in cases {
        let result = parser().parse("t", raw, OBSERVED);
        assert_eq!(result.passed, passed, "passed for {raw:?}");
        assert_eq!(result.failed, failed, "failed for {raw:?}");
        assert_eq!(result.success, success, "success for {raw:?}");
        assert_eq!(result.duration, OBSERVED);
    }
}

/// Empty text is a heuristic failure with zero counts.
#[test]
fn empty_output_is_unsuccessful() {
    let result = parser().parse("t", "", OBSERVED);
    assert_eq!(result.source, ResultSource::Heuristic);
    assert_eq!(result.total(), 0);
    assert!(!result.success);
}

/// Custom markers and tokens from configuration are honoured.
#[test]
fn configured_tokens_are_used() {
    let config = ParserConfig {
        marker: "@@RESULT@@".into(),
        pass_token: "ok:".into(),
        fail_token: "not ok:".into(),
    };
    let parser = OutputParser::from_config(&config).expect("parser");

    let heuristic = parser.parse("t", "ok: a\nok: b\n", OBSERVED);
    assert_eq!(heuristic.passed, 2);

    let authoritative = parser.parse("t", "@@RESULT@@{\"success\":true}", OBSERVED);
    assert_eq!(authoritative.source, ResultSource::Authoritative);
}

/// A custom chain can replace the default strategies.
#[test]
fn custom_strategy_chain() {
    let config = ParserConfig::default();
    let tokens = TokenCount::new("[PASS]", "[FAIL]").expect("tokens");
    assert_eq!(tokens.name(), "token_count");

    let parser = OutputParser::with_strategies(&config, vec![Box::new(tokens)]).expect("parser");
    let result = parser.parse("t", "::YAC_TEST_RESULT::{\"success\":true}", OBSERVED);

    assert_eq!(result.source, ResultSource::Heuristic, "marker tier removed");
}
