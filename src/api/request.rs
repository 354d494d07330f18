use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{ContextError, RequestContext};

/// Request for a decision, wrapped in an `input` document.
///
/// ```json
/// {"input": {"method": "POST", "path": "/open_pr", "headers": {"x-ci-token": "..."}}}
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub input: DecisionInput,
}

/// The request attributes the dispatcher extracted from its own transport.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionInput {
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl DecisionRequest {
    /// Convert to a RequestContext for rule evaluation.
    ///
    /// Header names are passed through untouched; the dispatcher decides
    /// how they are cased.
    pub fn to_request_context(&self) -> Result<RequestContext, ContextError> {
        let method = self.input.method.clone().ok_or(ContextError::MissingMethod)?;
        let path = self.input.path.clone().ok_or(ContextError::MissingPath)?;

        RequestContext::new(method, path, self.input.headers.clone())
    }
}
