//! Rule repository: where rules, criteria and variables come from
//!
//! The analyses only ever read through [`RuleRepository`]. [`MemoryRepository`]
//! is the in-process implementation, usually loaded from a rulebook file:
//!
//! ```yaml
//! variables:
//!   - name: AGE
//!     type: numerical
//!     lower_bound: 18
//!     upper_bound: 100
//!     step: 1
//! rules:
//!   - id: R1
//!     document_id: DOC1
//!     criteria:
//!       - AGE >= 18
//!       - { variable: AGE, operator: "<=", value: 30 }
//!     output_name: RISK
//!     output_value: LOW
//! ```
//!
//! [`resolve_rules`] fetches and validates everything a scan needs once, up
//! front, so the pairwise and sampling loops never touch the repository.

use crate::error::{Error, Result};
use crate::model::{Criterion, CriterionValue, Operator, Rule, RuleStatus, Variable};
use crate::parse::parse_criterion;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Read-only access to persisted rule data
pub trait RuleRepository {
    /// Look up a variable; `Error::MissingVariable` when absent
    fn get_variable(&self, name: &str) -> Result<Variable>;

    /// Look up a criterion; `Error::CriterionNotFound` when absent
    fn get_criterion(&self, id: &str) -> Result<Criterion>;

    /// Look up a rule; `Error::RuleNotFound` when absent
    fn get_rule(&self, id: &str) -> Result<Rule>;
}

/// Serialized rulebook
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Rulebook", description = "Variables and rules to analyze")]
pub struct Rulebook {
    #[serde(default)]
    pub variables: Vec<Variable>,

    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// A rule as written in a rulebook
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleEntry {
    pub id: String,

    #[serde(default)]
    pub document_id: String,

    #[serde(default)]
    pub status: RuleStatus,

    #[serde(default)]
    pub criteria: Vec<CriterionEntry>,

    pub output_name: String,

    #[serde(deserialize_with = "scalar_string")]
    pub output_value: String,
}

/// A criterion in script form (`AGE >= 18`) or structured form
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CriterionEntry {
    Script(String),
    Structured {
        variable: String,
        operator: Operator,
        value: CriterionValue,
    },
}

/// Accept `LOW`, `1`, `2.5` or `true` as an output value
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

impl Rulebook {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_norway::from_str(yaml).map_err(Error::Yaml)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::Json)
    }

    /// Load a rulebook, choosing the format by extension (`.json` or YAML)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}

/// In-memory repository
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    variables: HashMap<String, Variable>,
    criteria: HashMap<String, Criterion>,
    rules: BTreeMap<String, Rule>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a rulebook; criteria get ids `<rule_id>#<index>`
    pub fn from_rulebook(rulebook: Rulebook) -> Result<Self> {
        let mut repo = Self::new();
        for variable in rulebook.variables {
            if repo.variables.contains_key(&variable.name) {
                return Err(Error::Other(format!(
                    "Duplicate variable {} in rulebook",
                    variable.name
                )));
            }
            repo.insert_variable(variable);
        }

        for entry in rulebook.rules {
            let mut criteria = Vec::with_capacity(entry.criteria.len());
            for (idx, crn) in entry.criteria.into_iter().enumerate() {
                let id = format!("{}#{}", entry.id, idx);
                let criterion = match crn {
                    CriterionEntry::Script(text) => parse_criterion(id, &text).map_err(|e| {
                        Error::Parse(format!("rule {}: {}", entry.id, e))
                    })?,
                    CriterionEntry::Structured {
                        variable,
                        operator,
                        value,
                    } => Criterion::new(id, variable, operator, value),
                };
                criteria.push(criterion);
            }

            let rule = Rule {
                id: entry.id,
                document_id: entry.document_id,
                status: entry.status,
                criterion_ids: Vec::new(),
                output_name: entry.output_name,
                output_value: entry.output_value,
            };
            if repo.rules.contains_key(&rule.id) {
                return Err(Error::Other(format!("Duplicate rule {} in rulebook", rule.id)));
            }
            repo.insert_rule(rule, criteria);
        }
        Ok(repo)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_rulebook(Rulebook::from_yaml(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_rulebook(Rulebook::load(path)?)
    }

    pub fn insert_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    /// Insert a rule with its criteria; the rule's `criterion_ids` are replaced
    pub fn insert_rule(&mut self, mut rule: Rule, criteria: Vec<Criterion>) {
        rule.criterion_ids = criteria.iter().map(|c| c.id.clone()).collect();
        for criterion in criteria {
            self.criteria.insert(criterion.id.clone(), criterion);
        }
        self.rules.insert(rule.id.clone(), rule);
    }

    /// All rule ids, sorted
    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Distinct output names, sorted
    pub fn output_names(&self) -> Vec<String> {
        self.rules
            .values()
            .map(|r| r.output_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Ids of rules whose output is in `watch` (every rule when `watch` is empty)
    pub fn rule_ids_for_outputs(&self, watch: &[String]) -> Vec<String> {
        self.rules
            .values()
            .filter(|r| watch.is_empty() || watch.contains(&r.output_name))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Rule ids grouped by output name (only outputs in `watch` when non-empty)
    pub fn groups_by_output(&self, watch: &[String]) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rule in self.rules.values() {
            if watch.is_empty() || watch.contains(&rule.output_name) {
                groups
                    .entry(rule.output_name.clone())
                    .or_default()
                    .push(rule.id.clone());
            }
        }
        groups
    }
}

impl RuleRepository for MemoryRepository {
    fn get_variable(&self, name: &str) -> Result<Variable> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingVariable {
                name: name.to_string(),
            })
    }

    fn get_criterion(&self, id: &str) -> Result<Criterion> {
        self.criteria
            .get(id)
            .cloned()
            .ok_or_else(|| Error::CriterionNotFound(id.to_string()))
    }

    fn get_rule(&self, id: &str) -> Result<Rule> {
        self.rules
            .get(id)
            .cloned()
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))
    }
}

/// Why a rule was left out of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IssueKind {
    MissingVariable,
    InvalidVariable,
    InvalidCriterion,
    RuleNotFound,
    CriterionNotFound,
    Other,
}

/// A rule that could not take part in an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisIssue {
    pub rule_id: String,
    pub kind: IssueKind,
    pub message: String,
}

impl AnalysisIssue {
    pub fn from_error(rule_id: &str, error: &Error) -> Self {
        let kind = match error {
            Error::MissingVariable { .. } => IssueKind::MissingVariable,
            Error::InvalidVariable { .. } => IssueKind::InvalidVariable,
            Error::InvalidCriterion { .. } => IssueKind::InvalidCriterion,
            Error::RuleNotFound(_) => IssueKind::RuleNotFound,
            Error::CriterionNotFound(_) => IssueKind::CriterionNotFound,
            _ => IssueKind::Other,
        };
        Self {
            rule_id: rule_id.to_string(),
            kind,
            message: error.to_string(),
        }
    }
}

/// Variables referenced by a snapshot, fetched once
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variables: HashMap<String, Variable>,
}

impl Catalog {
    pub fn get(&self, name: &str) -> Result<&Variable> {
        self.variables.get(name).ok_or_else(|| Error::MissingVariable {
            name: name.to_string(),
        })
    }

    pub fn insert(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Fetch from the repository on first use
    fn fetch<R: RuleRepository + ?Sized>(&mut self, repo: &R, name: &str) -> Result<&Variable> {
        if !self.variables.contains_key(name) {
            let variable = repo.get_variable(name)?;
            variable.validate()?;
            self.insert(variable);
        }
        self.get(name)
    }
}

/// A rule with its criteria loaded and validated
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRule {
    pub rule: Rule,
    pub criteria: Vec<Criterion>,
}

impl ResolvedRule {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    /// Criteria grouped by variable name
    pub fn criteria_by_variable(&self) -> BTreeMap<&str, Vec<&Criterion>> {
        let mut groups: BTreeMap<&str, Vec<&Criterion>> = BTreeMap::new();
        for criterion in &self.criteria {
            groups
                .entry(criterion.variable_name.as_str())
                .or_default()
                .push(criterion);
        }
        groups
    }
}

/// Everything one analysis call reads, captured at call start
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub rules: Vec<ResolvedRule>,
    pub catalog: Catalog,
    pub issues: Vec<AnalysisIssue>,
}

/// Load and validate `rule_ids`; failing rules become issues, not errors
pub fn resolve_rules<R: RuleRepository + ?Sized>(repo: &R, rule_ids: &[String]) -> Snapshot {
    resolve_rules_matching(repo, rule_ids, |_| true)
}

/// Like [`resolve_rules`], silently skipping rules for which `filter` is false
pub fn resolve_rules_matching<R, F>(repo: &R, rule_ids: &[String], filter: F) -> Snapshot
where
    R: RuleRepository + ?Sized,
    F: Fn(&Rule) -> bool,
{
    let mut snapshot = Snapshot::default();
    for rule_id in rule_ids {
        let resolved = repo.get_rule(rule_id).and_then(|rule| {
            if filter(&rule) {
                resolve_criteria(repo, rule, &mut snapshot.catalog).map(Some)
            } else {
                Ok(None)
            }
        });
        match resolved {
            Ok(Some(rule)) => snapshot.rules.push(rule),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(rule_id = %rule_id, error = %e, "Rule excluded from analysis");
                snapshot.issues.push(AnalysisIssue::from_error(rule_id, &e));
            }
        }
    }
    tracing::debug!(
        rules = snapshot.rules.len(),
        variables = snapshot.catalog.len(),
        issues = snapshot.issues.len(),
        "Resolved rule snapshot"
    );
    snapshot
}

fn resolve_criteria<R: RuleRepository + ?Sized>(
    repo: &R,
    rule: Rule,
    catalog: &mut Catalog,
) -> Result<ResolvedRule> {
    let mut criteria = Vec::with_capacity(rule.criterion_ids.len());
    for criterion_id in &rule.criterion_ids {
        let criterion = repo.get_criterion(criterion_id)?;
        let variable = catalog.fetch(repo, &criterion.variable_name)?;
        criterion.validate(variable)?;
        criteria.push(criterion);
    }
    Ok(ResolvedRule { rule, criteria })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULEBOOK: &str = r#"
variables:
  - name: AGE
    type: numerical
    lower_bound: 18
    upper_bound: 100
    step: 1
  - name: CITY
    type: categorical
    options: [HN, HCM, DN]
rules:
  - id: R2
    document_id: DOC1
    criteria:
      - AGE >= 25
      - { variable: CITY, operator: "not in", value: [DN] }
    output_name: RISK
    output_value: HIGH
  - id: R1
    document_id: DOC1
    status: inactive
    criteria:
      - "CITY in ['HN', 'HCM']"
    output_name: RISK
    output_value: 1
  - id: R3
    criteria:
      - INCOME > 5
    output_name: LIMIT
    output_value: 10
"#;

    #[test]
    fn test_load_rulebook() {
        let repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        assert_eq!(repo.rule_ids(), vec!["R1", "R2", "R3"]);
        assert_eq!(repo.output_names(), vec!["LIMIT", "RISK"]);

        let r1 = repo.get_rule("R1").unwrap();
        assert_eq!(r1.status, RuleStatus::Inactive);
        assert_eq!(r1.output_value, "1");
        assert_eq!(r1.criterion_ids, vec!["R1#0"]);

        let c = repo.get_criterion("R2#1").unwrap();
        assert_eq!(c.operator, Operator::NotIn);
    }

    #[test]
    fn test_groups_by_output() {
        let repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        let groups = repo.groups_by_output(&["RISK".to_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["RISK"], vec!["R1", "R2"]);
        assert_eq!(repo.rule_ids_for_outputs(&[]).len(), 3);
    }

    #[test]
    fn test_missing_variable_is_observable() {
        let repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        assert!(matches!(
            repo.get_variable("INCOME"),
            Err(Error::MissingVariable { .. })
        ));

        let ids: Vec<String> = ["R1", "R2", "R3", "R9"].iter().map(|s| s.to_string()).collect();
        let snapshot = resolve_rules(&repo, &ids);
        assert_eq!(snapshot.rules.len(), 2);
        assert_eq!(snapshot.issues.len(), 2);
        assert_eq!(snapshot.issues[0].rule_id, "R3");
        assert_eq!(snapshot.issues[0].kind, IssueKind::MissingVariable);
        assert_eq!(snapshot.issues[1].kind, IssueKind::RuleNotFound);
    }

    #[test]
    fn test_invalid_criterion_excludes_only_that_rule() {
        let mut repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        repo.insert_rule(
            Rule {
                id: "BAD".into(),
                document_id: "DOC2".into(),
                status: RuleStatus::Active,
                criterion_ids: vec![],
                output_name: "RISK".into(),
                output_value: "LOW".into(),
            },
            vec![Criterion::new("BAD#0", "CITY", Operator::Gt, CriterionValue::Number(1.0))],
        );
        let ids: Vec<String> = ["BAD", "R2"].iter().map(|s| s.to_string()).collect();
        let snapshot = resolve_rules(&repo, &ids);
        assert_eq!(snapshot.rules.len(), 1);
        assert_eq!(snapshot.rules[0].id(), "R2");
        assert_eq!(snapshot.issues[0].kind, IssueKind::InvalidCriterion);
    }

    #[test]
    fn test_broken_variable_domain_is_its_own_issue() {
        let mut repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        repo.insert_variable(Variable::numerical("INCOME", 10.0, 0.0, 1.0));
        let ids: Vec<String> = ["R2", "R3"].iter().map(|s| s.to_string()).collect();
        let snapshot = resolve_rules(&repo, &ids);
        assert_eq!(snapshot.rules.len(), 1);
        assert_eq!(snapshot.issues[0].rule_id, "R3");
        assert_eq!(snapshot.issues[0].kind, IssueKind::InvalidVariable);
        assert!(snapshot.issues[0].message.contains("INCOME"));
    }

    #[test]
    fn test_bad_script_fails_load() {
        let yaml = "rules:\n  - id: R1\n    criteria: [\"AGE ~ 3\"]\n    output_name: X\n    output_value: Y\n";
        let err = MemoryRepository::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_criteria_by_variable() {
        let repo = MemoryRepository::from_yaml(RULEBOOK).unwrap();
        let snapshot = resolve_rules(&repo, &["R2".to_string()]);
        let groups = snapshot.rules[0].criteria_by_variable();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["AGE", "CITY"]);
    }
}
