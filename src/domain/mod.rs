pub mod policy;
pub mod refdata;
pub mod request;
pub mod verdict;

pub use policy::{ConditionDef, EqualsDef, Policy, RuleDef, ALLOW_DECISION};
pub use refdata::ReferenceData;
pub use request::{ContextError, RequestContext};
pub use verdict::Verdict;
