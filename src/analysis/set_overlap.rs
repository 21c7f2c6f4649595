//! Categorical overlap between two groups of membership criteria

use crate::model::{Criterion, Operator, Variable, VariableKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How several `in` / `not in` criteria on one variable combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SetSemantics {
    /// Conjunction: every criterion must admit the value
    #[default]
    Intersection,
    /// Legacy behavior: a value admitted by any criterion is allowed
    Union,
}

/// Values a criterion admits within the variable's options
fn admitted(options: &BTreeSet<String>, criterion: &Criterion) -> BTreeSet<String> {
    let Some(listed) = criterion.value.as_options() else {
        return BTreeSet::new();
    };
    match criterion.operator {
        Operator::In => listed.clone(),
        Operator::NotIn => options.difference(listed).cloned().collect(),
        _ => BTreeSet::new(),
    }
}

/// Effective allowed-value set of one criterion group
pub fn allowed_values(
    variable: &Variable,
    criteria: &[&Criterion],
    semantics: SetSemantics,
) -> BTreeSet<String> {
    let VariableKind::Categorical { options } = &variable.kind else {
        return BTreeSet::new();
    };

    match semantics {
        SetSemantics::Union => criteria
            .iter()
            .flat_map(|c| admitted(options, c))
            .collect(),
        SetSemantics::Intersection => {
            let mut allowed = options.clone();
            for criterion in criteria {
                let admits = admitted(options, criterion);
                allowed.retain(|v| admits.contains(v));
            }
            allowed
        }
    }
}

/// Shared values of two criterion groups, `None` when nothing is shared
pub fn overlap(
    variable: &Variable,
    group_a: &[&Criterion],
    group_b: &[&Criterion],
    semantics: SetSemantics,
) -> Option<BTreeSet<String>> {
    let a = allowed_values(variable, group_a, semantics);
    let b = allowed_values(variable, group_b, semantics);
    let shared: BTreeSet<String> = a.intersection(&b).cloned().collect();
    if shared.is_empty() {
        None
    } else {
        Some(shared)
    }
}
