use smallvec::SmallVec;

use crate::domain::{ReferenceData, RequestContext};
use crate::rules::condition::Condition;
use crate::rules::traits::Rule;

/// Rule that fires when every one of its conditions holds.
#[derive(Debug, Clone)]
pub struct ConjunctionRule {
    id: String,
    conditions: SmallVec<[Condition; 4]>,
}

impl ConjunctionRule {
    pub fn new(id: impl Into<String>, conditions: impl IntoIterator<Item = Condition>) -> Self {
        ConjunctionRule {
            id: id.into(),
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl Rule for ConjunctionRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &RequestContext, refdata: &ReferenceData) -> bool {
        self.conditions.iter().all(|c| c.evaluate(ctx, refdata))
    }
}
