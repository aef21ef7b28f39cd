//! RFC 7807 problem-detail bodies.
//!
//! Every rejection produced by the gateway and the issuer uses this shape, so
//! clients only ever parse one error format.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Body returned when a problem detail itself cannot be serialized.
pub const FALLBACK_PROBLEM_BODY: &str = r#"{"title":"Internal Server Error","status":500}"#;

/// A machine-readable error body.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetail {
    /// Problem type URI; `about:blank` when the status says it all.
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Short summary, usually the status reason phrase.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation of this occurrence.
    pub detail: String,
    /// The request path that produced the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// When the problem occurred.
    pub timestamp: DateTime<Utc>,
    /// Field-level messages, only present for validation failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProblemDetail {
    /// Create a problem for the given status, title and detail, stamped now.
    #[must_use]
    pub fn new(status: u16, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: None,
            timestamp: Utc::now(),
            errors: Vec::new(),
        }
    }

    /// Set the problem type URI.
    #[must_use]
    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }

    /// Set the request path the problem refers to.
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attach field-level validation messages.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails; callers fall back to
    /// [`FALLBACK_PROBLEM_BODY`].
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
