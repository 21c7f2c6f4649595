//! Canonical intervals for numerical criteria
//!
//! All criteria on one variable collapse into one inclusive `[low, high]`
//! interval. Strict inequalities are moved inward by the variable's `step`,
//! so with `step = 1`, `x > 3` becomes `x >= 4`.

use crate::model::{Criterion, Operator, Variable, VariableKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Inclusive interval `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

impl Interval {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.low <= x && x <= self.high
    }

    /// Overlap of two intervals, `None` when disjoint
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        if other.low <= self.high && self.low <= other.high {
            Some(Interval::new(
                self.low.max(other.low),
                self.high.min(other.high),
            ))
        } else {
            None
        }
    }
}

/// Collapse numerical criteria on `variable` into a canonical interval.
///
/// Returns `None` (empty) when the criteria cannot all hold, and for
/// categorical variables, which have no interval form.
pub fn build_range(variable: &Variable, criteria: &[&Criterion]) -> Option<Interval> {
    let VariableKind::Numerical {
        lower_bound,
        upper_bound,
        step,
    } = variable.kind
    else {
        return None;
    };

    let mut low = lower_bound;
    let mut high = upper_bound;
    let mut equal: Option<f64> = None;

    for criterion in criteria {
        let Some(value) = criterion.value.as_number() else {
            continue;
        };
        match criterion.operator {
            Operator::Gt => low = low.max(value + step),
            Operator::Ge => low = low.max(value),
            Operator::Lt => high = high.min(value - step),
            Operator::Le => high = high.min(value),
            Operator::Eq => {
                // A second equality on one variable makes the group empty
                if equal.is_some() {
                    return None;
                }
                equal = Some(value);
            }
            Operator::In | Operator::NotIn => {}
        }
    }

    match equal {
        Some(v) if low <= v && v <= high => Some(Interval::new(v, v)),
        Some(_) => None,
        None if low <= high => Some(Interval::new(low, high)),
        None => None,
    }
}
