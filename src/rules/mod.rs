pub mod condition;
pub mod conjunction;
pub mod evaluator;
pub mod traits;

pub use condition::{Condition, ConditionError, Field, Operand};
pub use conjunction::ConjunctionRule;
pub use evaluator::EvaluationSnapshot;
pub use traits::Rule;

use crate::domain::{Policy, ALLOW_DECISION};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while compiling a policy into a rule set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleSetError {
    #[error("rule '{rule_id}': {source}")]
    Condition {
        rule_id: String,
        #[source]
        source: ConditionError,
    },

    #[error("rule '{0}' has no conditions")]
    EmptyRule(String),
}

/// Ordered collection of compiled rules for one decision.
pub struct RuleSet {
    pub decision: String,
    pub default: bool,
    pub rules: Vec<Arc<dyn Rule>>,
    pub policy_version: String,
}

impl RuleSet {
    /// Compile the rules of a policy, preserving their declared order.
    pub fn from_policy(policy: &Policy) -> Result<Self, RuleSetError> {
        let mut rules: Vec<Arc<dyn Rule>> = Vec::with_capacity(policy.rules.len());

        for rule_def in &policy.rules {
            if rule_def.when.is_empty() {
                return Err(RuleSetError::EmptyRule(rule_def.id.clone()));
            }

            let conditions = rule_def
                .when
                .iter()
                .map(Condition::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| RuleSetError::Condition {
                    rule_id: rule_def.id.clone(),
                    source,
                })?;

            rules.push(Arc::new(ConjunctionRule::new(rule_def.id.clone(), conditions)));
        }

        Ok(RuleSet {
            decision: policy.decision.clone(),
            default: policy.default,
            rules,
            policy_version: policy.version.clone(),
        })
    }

    /// Create an empty rule set. Every request gets the deny default.
    pub fn empty() -> Self {
        RuleSet {
            decision: ALLOW_DECISION.to_string(),
            default: false,
            rules: Vec::new(),
            policy_version: "0.0.0".to_string(),
        }
    }

    /// The gateway policy guarding the pull request and ticket actions.
    ///
    /// POSTs to `/open_pr` or `/create_jira` need an `x-ci-token` header
    /// matching `allowed_tokens.ci`. Anything outside those two prefixes is
    /// allowed. Other methods on the guarded paths match neither rule and
    /// are denied.
    pub fn tool_gateway() -> Self {
        let guarded_post = ConjunctionRule::new(
            "ci_token_on_guarded_post",
            [
                Condition::equals(Field::Method, "POST"),
                Condition::path_in(["/open_pr", "/create_jira"]),
                Condition::equals_ref(Field::Header("x-ci-token".to_string()), "allowed_tokens.ci"),
            ],
        );
        let unguarded = ConjunctionRule::new(
            "outside_guarded_prefixes",
            [
                Condition::path_not_prefix("/open_pr"),
                Condition::path_not_prefix("/create_jira"),
            ],
        );

        RuleSet {
            decision: ALLOW_DECISION.to_string(),
            default: false,
            rules: vec![Arc::new(guarded_post), Arc::new(unguarded)],
            policy_version: "builtin-tool-gateway".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule ids in evaluation order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("decision", &self.decision)
            .field("default", &self.default)
            .field("rules", &self.rule_ids())
            .field("policy_version", &self.policy_version)
            .finish()
    }
}
