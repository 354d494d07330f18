use crate::domain::{ReferenceData, RequestContext};
use std::fmt::Debug;

/// Trait for rules contributing to an allow decision.
///
/// A rule is one independent sufficient condition: if it fires, the
/// decision is true. Rules are pure functions of the request and the
/// reference data; they hold no state and never fail. A comparand that
/// cannot be resolved means the rule does not fire.
pub trait Rule: Send + Sync + Debug {
    /// Unique identifier for this rule.
    fn id(&self) -> &str;

    /// Returns true if the rule fires for this request.
    fn evaluate(&self, ctx: &RequestContext, refdata: &ReferenceData) -> bool;
}
