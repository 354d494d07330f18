pub mod api;
pub mod config;
pub mod domain;
pub mod observability;
pub mod policy;
pub mod rules;

pub use config::Config;
pub use domain::{ReferenceData, RequestContext, Verdict};
pub use rules::{EvaluationSnapshot, Rule, RuleSet};
