use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::{ConditionDef, EqualsDef, ReferenceData, RequestContext};

const HEADER_FIELD_PREFIX: &str = "header:";

/// Errors raised while compiling a condition from its policy definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("unknown field '{0}' (expected method, path or header:<name>)")]
    UnknownField(String),

    #[error("header field has an empty name")]
    EmptyHeaderName,

    #[error("equality on '{0}' needs exactly one of 'value' or 'ref'")]
    AmbiguousOperand(String),

    #[error("equality on '{0}' references an empty key")]
    EmptyReference(String),

    #[error("path_in needs at least one candidate path")]
    EmptyPathSet,
}

/// Request attribute an equality condition reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Method,
    Path,
    Header(String),
}

impl Field {
    /// Resolve the field against a request. Absent headers yield `None`.
    #[inline]
    pub fn resolve<'a>(&self, ctx: &'a RequestContext) -> Option<&'a str> {
        match self {
            Field::Method => Some(ctx.method()),
            Field::Path => Some(ctx.path()),
            Field::Header(name) => ctx.header(name),
        }
    }
}

impl FromStr for Field {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "method" => Ok(Field::Method),
            "path" => Ok(Field::Path),
            _ => match s.strip_prefix(HEADER_FIELD_PREFIX) {
                Some("") => Err(ConditionError::EmptyHeaderName),
                Some(name) => Ok(Field::Header(name.to_string())),
                None => Err(ConditionError::UnknownField(s.to_string())),
            },
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Method => write!(f, "method"),
            Field::Path => write!(f, "path"),
            Field::Header(name) => write!(f, "{}{}", HEADER_FIELD_PREFIX, name),
        }
    }
}

/// Right-hand side of an equality condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Reference(String),
}

impl Operand {
    #[inline]
    pub fn resolve<'a>(&'a self, refdata: &'a ReferenceData) -> Option<&'a str> {
        match self {
            Operand::Literal(value) => Some(value.as_str()),
            Operand::Reference(key) => refdata.lookup(key),
        }
    }
}

/// Atomic condition of a rule.
///
/// Every variant is total: a missing header or reference key makes the
/// condition false rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Field equals the operand; both sides must be present.
    Equality { field: Field, operand: Operand },
    /// Path is exactly one of the candidates.
    PathMembership { candidates: SmallVec<[String; 4]> },
    /// Path does not start with the prefix (byte-wise).
    NegatedPrefix { prefix: String },
}

impl Condition {
    pub fn equals(field: Field, value: impl Into<String>) -> Self {
        Condition::Equality {
            field,
            operand: Operand::Literal(value.into()),
        }
    }

    pub fn equals_ref(field: Field, key: impl Into<String>) -> Self {
        Condition::Equality {
            field,
            operand: Operand::Reference(key.into()),
        }
    }

    pub fn path_in<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::PathMembership {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path_not_prefix(prefix: impl Into<String>) -> Self {
        Condition::NegatedPrefix {
            prefix: prefix.into(),
        }
    }

    /// Evaluate the condition against a request and reference data.
    #[inline]
    pub fn evaluate(&self, ctx: &RequestContext, refdata: &ReferenceData) -> bool {
        match self {
            Condition::Equality { field, operand } => {
                match (field.resolve(ctx), operand.resolve(refdata)) {
                    // Reference values are secrets
                    (Some(lhs), Some(rhs)) => match operand {
                        Operand::Reference(_) => lhs.as_bytes().ct_eq(rhs.as_bytes()).into(),
                        Operand::Literal(_) => lhs == rhs,
                    },
                    _ => false,
                }
            }
            Condition::PathMembership { candidates } => {
                let path = ctx.path();
                candidates.iter().any(|c| c == path)
            }
            Condition::NegatedPrefix { prefix } => !ctx.path().starts_with(prefix.as_str()),
        }
    }
}

impl TryFrom<&ConditionDef> for Condition {
    type Error = ConditionError;

    fn try_from(def: &ConditionDef) -> Result<Self, Self::Error> {
        match def {
            ConditionDef::Equals(EqualsDef {
                field,
                value,
                reference,
            }) => {
                let parsed: Field = field.parse()?;
                match (value, reference) {
                    (Some(value), None) => Ok(Condition::equals(parsed, value.clone())),
                    (None, Some(key)) if key.is_empty() => {
                        Err(ConditionError::EmptyReference(field.clone()))
                    }
                    (None, Some(key)) => Ok(Condition::equals_ref(parsed, key.clone())),
                    _ => Err(ConditionError::AmbiguousOperand(field.clone())),
                }
            }
            ConditionDef::PathIn(paths) if paths.is_empty() => Err(ConditionError::EmptyPathSet),
            ConditionDef::PathIn(paths) => Ok(Condition::path_in(paths.iter().cloned())),
            ConditionDef::PathNotPrefix(prefix) => Ok(Condition::path_not_prefix(prefix.clone())),
        }
    }
}
