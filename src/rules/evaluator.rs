use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{ReferenceData, RequestContext, Verdict};

use super::RuleSet;

impl RuleSet {
    /// Reduce the rule set to a verdict for one request.
    ///
    /// Rules are tried in declared order and the first one that fires
    /// decides. If none fires the rule set default is returned.
    pub fn evaluate(&self, ctx: &RequestContext, refdata: &ReferenceData) -> Verdict {
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.evaluate(ctx, refdata) {
                return Verdict::matched(
                    rule.id(),
                    &self.policy_version,
                    refdata.version(),
                    idx + 1,
                );
            }
        }

        Verdict::default_value(
            self.default,
            &self.policy_version,
            refdata.version(),
            self.rules.len(),
        )
    }
}

/// One consistent pairing of a rule set with the reference data it reads.
///
/// Reloads publish a new snapshot; callers clone the `Arc` once per request
/// and evaluate against it, so a reload never shows a half-updated store.
#[derive(Debug, Clone)]
pub struct EvaluationSnapshot {
    pub ruleset: Arc<RuleSet>,
    pub refdata: Arc<ReferenceData>,
    pub loaded_at: DateTime<Utc>,
}

impl EvaluationSnapshot {
    pub fn new(ruleset: RuleSet, refdata: ReferenceData) -> Self {
        EvaluationSnapshot {
            ruleset: Arc::new(ruleset),
            refdata: Arc::new(refdata),
            loaded_at: Utc::now(),
        }
    }

    /// Snapshot that denies every request.
    pub fn deny_all() -> Self {
        EvaluationSnapshot::new(RuleSet::empty(), ReferenceData::empty())
    }

    #[inline]
    pub fn evaluate(&self, ctx: &RequestContext) -> Verdict {
        self.ruleset.evaluate(ctx, &self.refdata)
    }

    pub fn policy_version(&self) -> &str {
        &self.ruleset.policy_version
    }

    pub fn refdata_version(&self) -> &str {
        self.refdata.version()
    }
}
