// tests/classifier_tests.rs

use provider_key_pool::pool::{
    FailureClassifier, FailureKind, KeywordClassifier, StatusCodeClassifier, UpstreamFailure,
};
use rstest::rstest;

#[rstest]
#[case("429 Too Many Requests", FailureKind::RateLimit)]
#[case("Rate limit reached for this key", FailureKind::RateLimit)]
#[case("Monthly QUOTA EXCEEDED", FailureKind::RateLimit)]
#[case("request limit exceeded", FailureKind::RateLimit)]
#[case("HTTP 401", FailureKind::Auth)]
#[case("403 Forbidden", FailureKind::Auth)]
#[case("Unauthorized", FailureKind::Auth)]
#[case("invalid token provided", FailureKind::Auth)]
#[case("Authentication failed for request", FailureKind::Auth)]
#[case("500 Internal Server Error", FailureKind::Generic)]
#[case("connection reset by peer", FailureKind::Generic)]
#[case("", FailureKind::Generic)]
fn test_keyword_classification(#[case] message: &str, #[case] expected: FailureKind) {
    assert_eq!(KeywordClassifier.classify(&UpstreamFailure::new(message)), expected);
}

#[rstest]
#[case(Some(429), "boom", FailureKind::RateLimit)]
#[case(Some(401), "boom", FailureKind::Auth)]
#[case(Some(403), "boom", FailureKind::Auth)]
#[case(Some(502), "too many requests", FailureKind::Generic)]
#[case(None, "too many requests", FailureKind::RateLimit)]
#[case(None, "unauthorized", FailureKind::Auth)]
#[case(None, "timeout", FailureKind::Generic)]
fn test_status_code_classification(
    #[case] status: Option<u16>,
    #[case] message: &str,
    #[case] expected: FailureKind,
) {
    let failure = UpstreamFailure {
        status,
        message: message.to_string(),
    };
    assert_eq!(StatusCodeClassifier.classify(&failure), expected);
}

#[test]
fn test_failure_kind_serializes_snake_case() {
    let json = serde_json::to_string(&[FailureKind::RateLimit, FailureKind::Auth, FailureKind::Generic]).unwrap();
    assert_eq!(json, r#"["rate_limit","auth","generic"]"#);
}
