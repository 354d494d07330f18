use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::{Policy, ReferenceData, ALLOW_DECISION};
use crate::rules::{EvaluationSnapshot, RuleSet, RuleSetError};

/// Default prefix for environment variables overlaid onto reference data.
pub const DEFAULT_REFDATA_ENV_PREFIX: &str = "ACTIONGATE_REF_";

/// Errors that can occur during policy or reference data loading.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rule compilation error: {0}")]
    Rules(#[from] RuleSetError),
}

/// Load a policy from a YAML file.
pub fn load_policy(path: impl AsRef<Path>) -> Result<Policy, PolicyError> {
    let content = fs::read_to_string(path)?;
    let policy: Policy = serde_yaml::from_str(&content)?;

    validate_policy(&policy)?;

    Ok(policy)
}

/// Load reference data from a YAML file.
///
/// Nested mappings are flattened into dotted keys:
///
/// ```yaml
/// allowed_tokens:
///   ci: secret123
/// ```
///
/// becomes `allowed_tokens.ci = "secret123"`.
pub fn load_refdata(path: impl AsRef<Path>) -> Result<ReferenceData, PolicyError> {
    let content = fs::read_to_string(path)?;
    parse_refdata(&content)
}

/// Parse reference data from YAML text.
pub fn parse_refdata(content: &str) -> Result<ReferenceData, PolicyError> {
    let root: Value = serde_yaml::from_str(content)?;

    if !root.is_mapping() {
        return Err(PolicyError::Validation(
            "Reference data must be a mapping".to_string(),
        ));
    }

    let mut flat = BTreeMap::new();
    flatten_into(&mut flat, None, &root)?;

    Ok(ReferenceData::from_pairs(flat))
}

fn flatten_into(
    out: &mut BTreeMap<String, String>,
    prefix: Option<&str>,
    value: &Value,
) -> Result<(), PolicyError> {
    let join = |segment: &str| match prefix {
        Some(p) => format!("{}.{}", p, segment),
        None => segment.to_string(),
    };

    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let segment = key.as_str().ok_or_else(|| {
                    PolicyError::Validation(format!(
                        "Reference data key under '{}' is not a string",
                        prefix.unwrap_or("<root>")
                    ))
                })?;
                if segment.is_empty() {
                    return Err(PolicyError::Validation(format!(
                        "Empty reference data key under '{}'",
                        prefix.unwrap_or("<root>")
                    )));
                }
                flatten_into(out, Some(&join(segment)), child)?;
            }
            Ok(())
        }
        Value::String(s) => insert_scalar(out, prefix, s.clone()),
        Value::Number(n) => insert_scalar(out, prefix, n.to_string()),
        Value::Bool(b) => insert_scalar(out, prefix, b.to_string()),
        Value::Null => Err(PolicyError::Validation(format!(
            "Reference data key '{}' has no value",
            prefix.unwrap_or("<root>")
        ))),
        Value::Sequence(_) | Value::Tagged(_) => Err(PolicyError::Validation(format!(
            "Reference data key '{}' must be a string, number or boolean",
            prefix.unwrap_or("<root>")
        ))),
    }
}

fn insert_scalar(
    out: &mut BTreeMap<String, String>,
    key: Option<&str>,
    scalar: String,
) -> Result<(), PolicyError> {
    let key = key.ok_or_else(|| {
        PolicyError::Validation("Reference data must be a mapping".to_string())
    })?;

    if out.insert(key.to_string(), scalar).is_some() {
        return Err(PolicyError::Validation(format!(
            "Duplicate reference data key: {}",
            key
        )));
    }

    Ok(())
}

/// Map environment variables onto reference data keys.
///
/// `<prefix>ALLOWED_TOKENS__CI=x` becomes `allowed_tokens.ci = x`. Variables
/// without the prefix, or with empty path segments, are ignored.
pub fn env_overrides<I>(prefix: &str, vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides: Vec<(String, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let rest = name.strip_prefix(prefix)?;
            let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
            if segments.iter().any(String::is_empty) {
                return None;
            }
            Some((segments.join("."), value))
        })
        .collect();

    overrides.sort();
    overrides
}

/// Validate policy configuration.
fn validate_policy(policy: &Policy) -> Result<(), PolicyError> {
    if policy.version.is_empty() {
        return Err(PolicyError::Validation(
            "Policy version cannot be empty".to_string(),
        ));
    }

    if policy.decision != ALLOW_DECISION {
        return Err(PolicyError::Validation(format!(
            "Unsupported decision '{}' (only '{}' is evaluated)",
            policy.decision, ALLOW_DECISION
        )));
    }

    let mut seen_ids = HashSet::new();
    for rule in &policy.rules {
        if rule.id.is_empty() {
            return Err(PolicyError::Validation(
                "Rule id cannot be empty".to_string(),
            ));
        }
        if !seen_ids.insert(&rule.id) {
            return Err(PolicyError::Validation(format!(
                "Duplicate rule ID: {}",
                rule.id
            )));
        }
    }

    Ok(())
}

/// Policy loader that manages policy and reference data loading.
pub struct PolicyLoader {
    policy_path: String,
    refdata_path: String,
    env_prefix: Option<String>,
}

impl PolicyLoader {
    /// Create a new policy loader.
    pub fn new(policy_path: impl Into<String>, refdata_path: impl Into<String>) -> Self {
        PolicyLoader {
            policy_path: policy_path.into(),
            refdata_path: refdata_path.into(),
            env_prefix: None,
        }
    }

    /// Overlay environment variables with this prefix onto the reference data.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.env_prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Load policy and reference data, returning a ready snapshot.
    pub fn load(&self) -> Result<(Policy, EvaluationSnapshot), PolicyError> {
        let policy = load_policy(&self.policy_path)?;
        let refdata = self.load_refdata()?;

        let ruleset = RuleSet::from_policy(&policy)?;

        Ok((policy, EvaluationSnapshot::new(ruleset, refdata)))
    }

    /// Load only the policy (without rebuilding rules).
    pub fn load_policy(&self) -> Result<Policy, PolicyError> {
        load_policy(&self.policy_path)
    }

    /// Load the reference data file with the environment overlay applied.
    pub fn load_refdata(&self) -> Result<ReferenceData, PolicyError> {
        let refdata = load_refdata(&self.refdata_path)?;

        match &self.env_prefix {
            Some(prefix) => Ok(refdata.with_overrides(env_overrides(prefix, std::env::vars()))),
            None => Ok(refdata),
        }
    }

    /// Get the policy file path.
    pub fn policy_path(&self) -> &str {
        &self.policy_path
    }

    /// Get the reference data file path.
    pub fn refdata_path(&self) -> &str {
        &self.refdata_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestContext;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GATEWAY_POLICY: &str = r#"
policy_version: "test-1.0"
decision: allow
default: false
rules:
  - id: ci_token_on_guarded_post
    when:
      - equals: { field: method, value: POST }
      - path_in: ["/open_pr", "/create_jira"]
      - equals: { field: "header:x-ci-token", ref: allowed_tokens.ci }
  - id: outside_guarded_prefixes
    when:
      - path_not_prefix: /open_pr
      - path_not_prefix: /create_jira
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_policy() {
        let file = write_temp(GATEWAY_POLICY);

        let policy = load_policy(file.path()).unwrap();

        assert_eq!(policy.version, "test-1.0");
        assert_eq!(policy.rules.len(), 2);
        assert_eq!(policy.rules[1].id, "outside_guarded_prefixes");
    }

    #[test]
    fn test_load_refdata_flattens() {
        let file = write_temp(
            r#"
allowed_tokens:
  ci: secret123
  nightly: 42
limits:
  strict: true
"#,
        );

        let refdata = load_refdata(file.path()).unwrap();

        assert_eq!(refdata.len(), 3);
        assert_eq!(refdata.lookup("allowed_tokens.ci"), Some("secret123"));
        assert_eq!(refdata.lookup("allowed_tokens.nightly"), Some("42"));
        assert_eq!(refdata.lookup("limits.strict"), Some("true"));
        assert_eq!(refdata.lookup("allowed_tokens"), None);
    }

    #[test]
    fn test_refdata_rejects_sequences_and_nulls() {
        let err = parse_refdata("allowed_tokens:\n  ci: [a, b]\n").unwrap_err();
        assert!(err.to_string().contains("allowed_tokens.ci"));

        let err = parse_refdata("allowed_tokens:\n  ci:\n").unwrap_err();
        assert!(err.to_string().contains("no value"));
    }

    #[test]
    fn test_refdata_must_be_mapping() {
        assert!(matches!(
            parse_refdata("").unwrap_err(),
            PolicyError::Validation(_)
        ));
        assert!(matches!(
            parse_refdata("- a\n- b\n").unwrap_err(),
            PolicyError::Validation(_)
        ));
    }

    #[test]
    fn test_refdata_duplicate_dotted_key() {
        let err = parse_refdata("a.b: x\na:\n  b: y\n").unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("ACTIONGATE_REF_ALLOWED_TOKENS__CI".to_string(), "from-env".to_string()),
            ("ACTIONGATE_REF_BAD____KEY".to_string(), "x".to_string()),
            ("ACTIONGATE_REF_".to_string(), "x".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        let overrides = env_overrides(DEFAULT_REFDATA_ENV_PREFIX, vars);

        assert_eq!(
            overrides,
            vec![("allowed_tokens.ci".to_string(), "from-env".to_string())]
        );
    }

    #[test]
    fn test_policy_validation_empty_version() {
        let file = write_temp("policy_version: \"\"\nrules: []\n");

        let result = load_policy(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("version"));
    }

    #[test]
    fn test_policy_validation_unknown_decision() {
        let file = write_temp("policy_version: v1\ndecision: deny\nrules: []\n");

        let err = load_policy(file.path()).unwrap_err();
        assert!(err.to_string().contains("deny"));
    }

    #[test]
    fn test_policy_validation_duplicate_ids() {
        let file = write_temp(
            r#"
policy_version: "test"
rules:
  - id: R1
    when:
      - path_not_prefix: /a
  - id: R1
    when:
      - path_not_prefix: /b
"#,
        );

        let result = load_policy(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_unknown_condition_kind_rejected() {
        let file = write_temp(
            r#"
policy_version: "test"
rules:
  - id: R1
    when:
      - path_matches: "/a.*"
"#,
        );

        assert!(matches!(
            load_policy(file.path()).unwrap_err(),
            PolicyError::Yaml(_)
        ));
    }

    #[test]
    fn test_policy_loader() {
        let policy_file = write_temp(GATEWAY_POLICY);
        let refdata_file = write_temp("allowed_tokens:\n  ci: secret123\n");

        let loader = PolicyLoader::new(
            policy_file.path().to_string_lossy(),
            refdata_file.path().to_string_lossy(),
        );

        let (policy, snapshot) = loader.load().unwrap();

        assert_eq!(policy.version, "test-1.0");
        assert_eq!(snapshot.ruleset.len(), 2);
        assert_eq!(snapshot.policy_version(), "test-1.0");

        let mut headers = HashMap::new();
        headers.insert("x-ci-token".to_string(), "secret123".to_string());
        let ctx = RequestContext::new("POST", "/open_pr", headers).unwrap();
        assert!(snapshot.evaluate(&ctx).allowed());
    }

    #[test]
    fn test_policy_loader_rule_without_conditions() {
        let policy_file = write_temp("policy_version: v1\nrules:\n  - id: R1\n");
        let refdata_file = write_temp("{}");

        let loader = PolicyLoader::new(
            policy_file.path().to_string_lossy(),
            refdata_file.path().to_string_lossy(),
        );

        assert!(matches!(
            loader.load().unwrap_err(),
            PolicyError::Rules(RuleSetError::EmptyRule(_))
        ));
    }

    #[test]
    fn test_policy_loader_missing_refdata_fails() {
        let policy_file = write_temp(GATEWAY_POLICY);
        let loader = PolicyLoader::new(
            policy_file.path().to_string_lossy(),
            "/nonexistent/refdata.yaml",
        );

        assert!(matches!(loader.load().unwrap_err(), PolicyError::Io(_)));
    }

    #[test]
    fn test_load_policy_compiles_every_condition_kind() {
        use crate::domain::{ConditionDef, EqualsDef};
        use crate::rules::{Condition, Field};

        let file = write_temp(GATEWAY_POLICY);
        let policy = load_policy(file.path()).unwrap();

        assert_eq!(
            policy.rules[0].when,
            vec![
                ConditionDef::Equals(EqualsDef {
                    field: "method".to_string(),
                    value: Some("POST".to_string()),
                    reference: None,
                }),
                ConditionDef::PathIn(vec!["/open_pr".to_string(), "/create_jira".to_string()]),
                ConditionDef::Equals(EqualsDef {
                    field: "header:x-ci-token".to_string(),
                    value: None,
                    reference: Some("allowed_tokens.ci".to_string()),
                }),
            ]
        );

        let compiled: Vec<Condition> = policy
            .rules
            .iter()
            .flat_map(|rule| rule.when.iter())
            .map(|def| Condition::try_from(def).unwrap())
            .collect();

        assert_eq!(
            compiled,
            vec![
                Condition::equals(Field::Method, "POST"),
                Condition::path_in(["/open_pr", "/create_jira"]),
                Condition::equals_ref(Field::Header("x-ci-token".to_string()), "allowed_tokens.ci"),
                Condition::path_not_prefix("/open_pr"),
                Condition::path_not_prefix("/create_jira"),
            ]
        );
    }

    #[test]
    fn test_policy_loader_applies_env_overlay() {
        let policy_file = write_temp(GATEWAY_POLICY);
        let refdata_file = write_temp("allowed_tokens:\n  ci: change-me\n");

        // Only loaders built with this prefix read the variable
        std::env::set_var("ACTIONGATE_REF_LOADER_TEST_ALLOWED_TOKENS__CI", "from-env");

        let loader = PolicyLoader::new(
            policy_file.path().to_string_lossy(),
            refdata_file.path().to_string_lossy(),
        )
        .with_env_prefix("ACTIONGATE_REF_LOADER_TEST_");
        let (_, snapshot) = loader.load().unwrap();

        std::env::remove_var("ACTIONGATE_REF_LOADER_TEST_ALLOWED_TOKENS__CI");

        assert_eq!(snapshot.refdata.lookup("allowed_tokens.ci"), Some("from-env"));

        let mut headers = HashMap::new();
        headers.insert("x-ci-token".to_string(), "from-env".to_string());
        let ctx = RequestContext::new("POST", "/open_pr", headers).unwrap();
        assert!(snapshot.evaluate(&ctx).allowed());

        let mut headers = HashMap::new();
        headers.insert("x-ci-token".to_string(), "change-me".to_string());
        let ctx = RequestContext::new("POST", "/open_pr", headers).unwrap();
        assert!(!snapshot.evaluate(&ctx).allowed());
    }

    #[test]
    fn test_shipped_policy_matches_gateway_scenarios() {
        let policy = load_policy(concat!(env!("CARGO_MANIFEST_DIR"), "/policy.yaml")).unwrap();
        let ruleset = RuleSet::from_policy(&policy).unwrap();
        let refdata = ReferenceData::from_pairs([("allowed_tokens.ci", "secret123")]);

        let cases: [(&str, &str, Option<&str>, bool); 6] = [
            ("POST", "/open_pr", Some("secret123"), true),
            ("POST", "/open_pr", Some("wrong"), false),
            ("GET", "/open_pr", None, false),
            ("GET", "/status", None, true),
            ("POST", "/create_jira", Some("secret123"), true),
            ("DELETE", "/open_pr/123", None, false),
        ];

        for (method, path, token, expected) in cases {
            let mut headers = HashMap::new();
            if let Some(token) = token {
                headers.insert("x-ci-token".to_string(), token.to_string());
            }
            let ctx = RequestContext::new(method, path, headers).unwrap();

            let from_file = ruleset.evaluate(&ctx, &refdata);
            let builtin = RuleSet::tool_gateway().evaluate(&ctx, &refdata);

            assert_eq!(from_file.allowed(), expected, "{} {}", method, path);
            assert_eq!(from_file.matched_rule, builtin.matched_rule, "{} {}", method, path);
        }
    }
}
