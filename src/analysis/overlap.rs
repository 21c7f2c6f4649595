//! Per-variable overlap detection
//!
//! Numerical groups are compared as canonical intervals, categorical groups
//! as allowed-value sets.

use super::range::{build_range, Interval};
use super::set_overlap::{self, SetSemantics};
use crate::model::{render_set, Criterion, Variable, VariableKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Region two rules share on one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OverlapRegion {
    Range { low: f64, high: f64 },
    Values { values: BTreeSet<String> },
}

/// Overlap on one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlapResult {
    pub variable_name: String,
    pub region: OverlapRegion,
}

impl OverlapResult {
    /// `lo <= VAR <= hi` or `VAR in {A, B}`
    pub fn to_script(&self) -> String {
        match &self.region {
            OverlapRegion::Range { low, high } => {
                format!("{} <= {} <= {}", low, self.variable_name, high)
            }
            OverlapRegion::Values { values } => {
                format!("{} in {}", self.variable_name, render_set(values))
            }
        }
    }
}

/// Compare two criterion groups on `variable`; `None` when they cannot both hold
pub fn detect(
    variable: &Variable,
    group_a: &[&Criterion],
    group_b: &[&Criterion],
    semantics: SetSemantics,
) -> Option<OverlapResult> {
    let region = match variable.kind {
        VariableKind::Numerical { .. } => {
            let a = build_range(variable, group_a)?;
            let b = build_range(variable, group_b)?;
            let Interval { low, high } = a.intersect(&b)?;
            OverlapRegion::Range { low, high }
        }
        VariableKind::Categorical { .. } => OverlapRegion::Values {
            values: set_overlap::overlap(variable, group_a, group_b, semantics)?,
        },
    };
    Some(OverlapResult {
        variable_name: variable.name.clone(),
        region,
    })
}
