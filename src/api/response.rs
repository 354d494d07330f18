use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Verdict;

/// Response from a decision check.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    /// Decision document; the dispatcher reads `result.allow`
    pub result: DecisionResult,

    /// Identifier for correlating this decision with logs
    pub decision_id: Uuid,

    /// Rule that fired, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,

    /// Policy version used for this decision
    pub policy_version: String,

    /// Reference data version used for this decision
    pub refdata_version: String,
}

#[derive(Debug, Serialize)]
pub struct DecisionResult {
    pub allow: bool,
}

impl DecisionResponse {
    /// Create a response from an evaluated verdict.
    pub fn new(decision_id: Uuid, verdict: Verdict) -> Self {
        DecisionResponse {
            result: DecisionResult {
                allow: verdict.allow,
            },
            decision_id,
            matched_rule: verdict.matched_rule,
            policy_version: verdict.policy_version,
            refdata_version: verdict.refdata_version,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub policy_version: String,
    pub uptime_secs: u64,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub policy_version: String,
    pub refdata_version: String,
    pub rules: usize,
    pub refdata_keys: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "BAD_REQUEST")
    }
}
