use serde::{Deserialize, Serialize};

/// Name of the only decision the engine evaluates.
pub const ALLOW_DECISION: &str = "allow";

/// Policy document describing one decision and the rules that grant it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Policy version identifier
    #[serde(rename = "policy_version")]
    pub version: String,

    /// Decision name the rules contribute to
    #[serde(default = "default_decision")]
    pub decision: String,

    /// Value returned when no rule fires
    #[serde(default)]
    pub default: bool,

    /// Rule definitions, evaluated in order
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

fn default_decision() -> String {
    ALLOW_DECISION.to_string()
}

impl Policy {
    /// Create an empty, deny-everything policy.
    pub fn empty() -> Self {
        Policy {
            version: "0.0.0".to_string(),
            decision: default_decision(),
            default: false,
            rules: Vec::new(),
        }
    }
}

/// Definition of a single rule: all conditions must hold for it to fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Unique rule identifier
    pub id: String,

    /// Conjunction of conditions, each written as a single-key map
    /// (`- equals: {...}`) rather than a YAML tag
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub when: Vec<ConditionDef>,
}

/// Atomic condition as written in a policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionDef {
    /// `field` equals a literal `value` or the reference data entry `ref`
    Equals(EqualsDef),
    /// Request path is exactly one of the listed paths
    PathIn(Vec<String>),
    /// Request path does not start with the given prefix
    PathNotPrefix(String),
}

/// Operands of an equality condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualsDef {
    /// `method`, `path`, or `header:<name>`
    pub field: String,

    /// Literal comparand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Dotted reference data key used as the comparand
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}
