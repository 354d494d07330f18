use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of evaluating a rule set against one request.
///
/// `allow` is the verdict the dispatcher acts on. The remaining fields say
/// which rule fired (if any) and which policy and reference data versions
/// produced the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// The decision value
    pub allow: bool,

    /// Id of the first rule that fired; `None` when the default applied
    pub matched_rule: Option<String>,

    /// Policy version of the rule set
    pub policy_version: String,

    /// Version of the reference data store
    pub refdata_version: String,

    /// Number of rules evaluated before the verdict was reached
    #[serde(skip)]
    pub rules_evaluated: usize,
}

impl Verdict {
    /// Verdict produced by a firing rule.
    pub fn matched(
        rule_id: impl Into<String>,
        policy_version: impl Into<String>,
        refdata_version: impl Into<String>,
        rules_evaluated: usize,
    ) -> Self {
        Verdict {
            allow: true,
            matched_rule: Some(rule_id.into()),
            policy_version: policy_version.into(),
            refdata_version: refdata_version.into(),
            rules_evaluated,
        }
    }

    /// Verdict produced when no rule fired.
    pub fn default_value(
        allow: bool,
        policy_version: impl Into<String>,
        refdata_version: impl Into<String>,
        rules_evaluated: usize,
    ) -> Self {
        Verdict {
            allow,
            matched_rule: None,
            policy_version: policy_version.into(),
            refdata_version: refdata_version.into(),
            rules_evaluated,
        }
    }

    #[inline]
    pub fn allowed(&self) -> bool {
        self.allow
    }

    /// Returns true if no rule fired and the rule set default was used.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.matched_rule.is_none()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.allow { "ALLOW" } else { "DENY" };
        match &self.matched_rule {
            Some(rule) => write!(f, "{} ({})", outcome, rule),
            None => write!(f, "{} (default)", outcome),
        }
    }
}
