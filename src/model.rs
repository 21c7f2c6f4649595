//! Rule data model: the typed entities the analyses consume
//!
//! A `Rule` is a conjunction of `Criterion`s guarding one output assignment.
//! Every criterion constrains one `Variable`, which is either numerical
//! (bounded, with a step used to canonicalize strict inequalities) or
//! categorical (a closed option set).
//!
//! ## Example
//!
//! ```yaml
//! variables:
//!   - name: AGE
//!     type: numerical
//!     lower_bound: 18
//!     upper_bound: 100
//!     step: 1
//!   - name: CITY
//!     type: categorical
//!     options: [HN, HCM]
//! ```

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A variable from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Variable {
    /// Unique variable name
    pub name: String,

    /// Kind and domain
    #[serde(flatten)]
    pub kind: VariableKind,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Variable kind together with its domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VariableKind {
    Numerical {
        lower_bound: f64,
        upper_bound: f64,
        /// Minimal increment; `x > 3` canonicalizes to `x >= 3 + step`
        #[serde(default = "default_step")]
        step: f64,
    },
    Categorical {
        options: BTreeSet<String>,
    },
}

fn default_step() -> f64 {
    1.0
}

impl Variable {
    /// Numerical variable constructor
    pub fn numerical(name: impl Into<String>, lower_bound: f64, upper_bound: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Numerical {
                lower_bound,
                upper_bound,
                step,
            },
            description: None,
        }
    }

    /// Categorical variable constructor
    pub fn categorical<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariableKind::Categorical {
                options: options.into_iter().map(Into::into).collect(),
            },
            description: None,
        }
    }

    /// Check the domain invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(Error::InvalidVariable {
                name: self.name.clone(),
                reason,
            })
        };
        match &self.kind {
            VariableKind::Numerical {
                lower_bound,
                upper_bound,
                step,
            } => {
                if !lower_bound.is_finite() || !upper_bound.is_finite() || !step.is_finite() {
                    return invalid("non-finite bound or step".into());
                }
                if lower_bound > upper_bound {
                    return invalid(format!(
                        "lower_bound {} above upper_bound {}",
                        lower_bound, upper_bound
                    ));
                }
                // Strict bounds move by `step`; zero would make `x > v` admit `v`
                if *step <= 0.0 {
                    return invalid(format!("step must be positive, got {}", step));
                }
            }
            VariableKind::Categorical { options } => {
                if options.is_empty() {
                    return invalid("categorical variable has no options".into());
                }
            }
        }
        Ok(())
    }
}

/// Criterion operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::In,
        Operator::NotIn,
    ];

    /// Operators valid on numerical variables
    pub fn is_numeric(self) -> bool {
        !self.is_membership()
    }

    /// `in` / `not in`
    pub fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Whether the operator admits its own threshold (`=`, `>=`, `<=`)
    pub fn includes_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ge | Operator::Le)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == symbol)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criterion value: a number for comparisons, a set for membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CriterionValue {
    Number(f64),
    Options(BTreeSet<String>),
}

impl CriterionValue {
    pub fn options<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CriterionValue::Options(values.into_iter().map(Into::into).collect())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CriterionValue::Number(n) => Some(*n),
            CriterionValue::Options(_) => None,
        }
    }

    pub fn as_options(&self) -> Option<&BTreeSet<String>> {
        match self {
            CriterionValue::Options(o) => Some(o),
            CriterionValue::Number(_) => None,
        }
    }
}

impl fmt::Display for CriterionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriterionValue::Number(n) => write!(f, "{}", n),
            CriterionValue::Options(o) => write!(f, "{}", render_set(o)),
        }
    }
}

/// One atomic condition `variable operator value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Criterion {
    pub id: String,
    pub variable_name: String,
    pub operator: Operator,
    pub value: CriterionValue,
}

impl Criterion {
    pub fn new(
        id: impl Into<String>,
        variable_name: impl Into<String>,
        operator: Operator,
        value: CriterionValue,
    ) -> Self {
        Self {
            id: id.into(),
            variable_name: variable_name.into(),
            operator,
            value,
        }
    }

    /// Check operator, value and variable kind agree
    pub fn validate(&self, variable: &Variable) -> Result<()> {
        let reason = match (&variable.kind, self.operator.is_numeric(), &self.value) {
            (VariableKind::Numerical { .. }, true, CriterionValue::Number(n)) => {
                if n.is_finite() {
                    return Ok(());
                }
                format!("non-finite threshold {}", n)
            }
            (VariableKind::Categorical { .. }, false, CriterionValue::Options(_)) => {
                return Ok(())
            }
            (VariableKind::Numerical { .. }, false, _) => format!(
                "operator `{}` used on numerical variable {}",
                self.operator, variable.name
            ),
            (VariableKind::Categorical { .. }, true, _) => format!(
                "operator `{}` used on categorical variable {}",
                self.operator, variable.name
            ),
            (_, true, CriterionValue::Options(_)) => {
                format!("operator `{}` requires a number", self.operator)
            }
            (_, false, CriterionValue::Number(_)) => {
                format!("operator `{}` requires a list of values", self.operator)
            }
        };
        Err(Error::InvalidCriterion {
            criterion_id: self.id.clone(),
            reason,
        })
    }

    /// Does a sampled value satisfy this criterion?
    pub fn check(&self, sample: &SampleValue) -> bool {
        match (sample, &self.value) {
            (SampleValue::Number(x), CriterionValue::Number(v)) => match self.operator {
                Operator::Eq => x == v,
                Operator::Gt => x > v,
                Operator::Ge => x >= v,
                Operator::Lt => x < v,
                Operator::Le => x <= v,
                Operator::In | Operator::NotIn => false,
            },
            (SampleValue::Category(c), CriterionValue::Options(values)) => match self.operator {
                Operator::In => values.contains(c),
                Operator::NotIn => !values.contains(c),
                _ => false,
            },
            _ => false,
        }
    }

    /// Render back to `VAR op value` form
    pub fn to_script(&self) -> String {
        format!("{} {} {}", self.variable_name, self.operator, self.value)
    }
}

/// Rule lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    #[default]
    Active,
    Inactive,
}

/// A rule: conjunction of criteria guarding `output_name = output_value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub id: String,
    pub document_id: String,
    #[serde(default)]
    pub status: RuleStatus,
    pub criterion_ids: Vec<String>,
    pub output_name: String,
    pub output_value: String,
}

impl Rule {
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }
}

/// One coordinate of a drawn sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Category(String),
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Number(n) => write!(f, "{}", n),
            SampleValue::Category(c) => f.write_str(c),
        }
    }
}

/// Render a value set as `{A, B}`
pub fn render_set(values: &BTreeSet<String>) -> String {
    let items: Vec<&str> = values.iter().map(String::as_str).collect();
    format!("{{{}}}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn age() -> Variable {
        Variable::numerical("AGE", 18.0, 100.0, 1.0)
    }

    fn city() -> Variable {
        Variable::categorical("CITY", ["HN", "HCM"])
    }

    #[test]
    fn test_operator_symbols() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.as_str()), Some(op));
        }
        assert_eq!(Operator::from_symbol("=="), None);
        assert!(Operator::Ge.includes_equality());
        assert!(!Operator::Gt.includes_equality());
    }

    #[test]
    fn test_validate_kind_mismatch() {
        let crn = Criterion::new("C1", "CITY", Operator::Ge, CriterionValue::Number(3.0));
        let err = crn.validate(&city()).unwrap_err();
        assert!(matches!(err, Error::InvalidCriterion { .. }));

        let crn = Criterion::new("C2", "AGE", Operator::In, CriterionValue::options(["1"]));
        assert!(crn.validate(&age()).is_err());

        let crn = Criterion::new("C3", "AGE", Operator::Ge, CriterionValue::options(["1"]));
        assert!(crn.validate(&age()).is_err());
    }

    #[test]
    fn test_check_numeric_and_membership() {
        let ge = Criterion::new("C1", "AGE", Operator::Ge, CriterionValue::Number(25.0));
        assert!(ge.check(&SampleValue::Number(25.0)));
        assert!(!ge.check(&SampleValue::Number(24.9)));
        assert!(!ge.check(&SampleValue::Category("25".into())));

        let not_in = Criterion::new("C2", "CITY", Operator::NotIn, CriterionValue::options(["HN"]));
        assert!(not_in.check(&SampleValue::Category("HCM".into())));
        assert!(!not_in.check(&SampleValue::Category("HN".into())));
    }

    #[test]
    fn test_variable_yaml_roundtrip_shape() {
        let yaml = "name: AGE\ntype: numerical\nlower_bound: 18\nupper_bound: 100\n";
        let var: Variable = serde_norway::from_str(yaml).unwrap();
        assert_eq!(var, age());

        let yaml = "name: CITY\ntype: categorical\noptions: [HN, HCM]\n";
        let var: Variable = serde_norway::from_str(yaml).unwrap();
        assert_eq!(var, city());
    }

    #[test]
    fn test_variable_validate() {
        assert!(age().validate().is_ok());
        assert!(Variable::numerical("X", 5.0, 1.0, 1.0).validate().is_err());
        assert!(Variable::categorical("Y", Vec::<String>::new()).validate().is_err());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    fn test_non_positive_step_rejected(#[case] step: f64) {
        let err = Variable::numerical("X", 0.0, 10.0, step).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidVariable { ref name, .. } if name == "X"));
    }

    #[test]
    fn test_to_script() {
        let crn = Criterion::new("C1", "CITY", Operator::NotIn, CriterionValue::options(["HN", "DN"]));
        assert_eq!(crn.to_script(), "CITY not in {DN, HN}");
    }
}
