// src/pool/classifier.rs

use serde::{Deserialize, Serialize};
use std::fmt;

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "too many requests",
    "429",
    "quota exceeded",
    "limit exceeded",
];

const AUTH_PATTERNS: &[&str] = &[
    "unauthorized",
    "invalid api key",
    "authentication failed",
    "401",
    "403",
    "forbidden",
    "invalid token",
];

/// How a failed upstream call affects the key that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Upstream throttled the key; short cooldown, breaker untouched.
    RateLimit,
    /// Credential rejected; breaker opens immediately.
    Auth,
    /// Anything else; only counts towards the consecutive-failure threshold.
    Generic,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized description of a failed upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamFailure {
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<&str> for UpstreamFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for UpstreamFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// The request URL is dropped: it may carry the key as a query parameter,
/// and keyword matching must not see it.
impl From<reqwest::Error> for UpstreamFailure {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.without_url().to_string(),
        }
    }
}

/// Decides which [`FailureKind`] a failure belongs to.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, failure: &UpstreamFailure) -> FailureKind;
}

/// Case-insensitive substring matching on the failure message.
/// Rate-limit wording wins over auth wording.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl FailureClassifier for KeywordClassifier {
    fn classify(&self, failure: &UpstreamFailure) -> FailureKind {
        let message = failure.message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

        if matches(RATE_LIMIT_PATTERNS) {
            FailureKind::RateLimit
        } else if matches(AUTH_PATTERNS) {
            FailureKind::Auth
        } else {
            FailureKind::Generic
        }
    }
}

/// Trusts the HTTP status when there is one and falls back to
/// [`KeywordClassifier`] otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusCodeClassifier;

impl FailureClassifier for StatusCodeClassifier {
    fn classify(&self, failure: &UpstreamFailure) -> FailureKind {
        match failure.status {
            Some(429) => FailureKind::RateLimit,
            Some(401) | Some(403) => FailureKind::Auth,
            Some(_) => FailureKind::Generic,
            None => KeywordClassifier.classify(failure),
        }
    }
}

/// Classifier selection as it appears in provider configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Keyword,
    StatusCode,
}

impl ClassifierKind {
    pub fn build(self) -> Box<dyn FailureClassifier> {
        match self {
            Self::Keyword => Box::new(KeywordClassifier),
            Self::StatusCode => Box::new(StatusCodeClassifier),
        }
    }
}
