use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Errors raised when a caller hands over an incomplete request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("request method is missing")]
    MissingMethod,

    #[error("request path is missing")]
    MissingPath,

    #[error("request path must start with '/': {0}")]
    RelativePath(String),
}

/// Immutable snapshot of an inbound request.
///
/// Method, path and header names are kept exactly as received. The engine
/// never case-folds or normalizes them; whatever the dispatcher extracted
/// from the transport is what rules compare against.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Build a request context, rejecting structurally incomplete input.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Result<Self, ContextError> {
        let method = method.into();
        let path = path.into();

        if method.is_empty() {
            return Err(ContextError::MissingMethod);
        }
        if path.is_empty() {
            return Err(ContextError::MissingPath);
        }
        if !path.starts_with('/') {
            return Err(ContextError::RelativePath(path));
        }

        Ok(RequestContext {
            method,
            path,
            headers,
        })
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Exact-key header lookup. `None` when the header was not sent.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
