//! Coverage-gap search by random sampling
//!
//! For one output group, samples are drawn over every variable the rules
//! reference. Numerical samples come from the domain bounds and every
//! threshold used by a criterion, each optionally nudged by a small offset
//! so both sides of a threshold get probed. Categorical samples come from
//! the variable's options. A sample no rule accepts is uncovered; for each
//! one the sampler records the tightest bracket of thresholds around it,
//! and identical brackets collapse into one gap.
//!
//! This is a probabilistic check. A report without gaps means no sample
//! fell outside every rule, not that the rules provably cover the space.
//! More samples raise recall at linear cost; a fixed seed makes the result
//! reproducible.

use crate::error::{Error, Result};
use crate::model::{render_set, Criterion, SampleValue, Variable, VariableKind};
use crate::repository::{resolve_rules_matching, AnalysisIssue, Catalog, ResolvedRule, RuleRepository};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;

/// Sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplingOptions {
    /// Number of samples drawn per output group
    pub samples: usize,
    /// Seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
    /// Offsets added to numerical sample points
    pub perturbations: Vec<f64>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            samples: 500,
            seed: None,
            perturbations: vec![0.0, 0.1],
        }
    }
}

/// One edge of a numerical bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub value: f64,
    /// Open edges exclude `value`
    pub open: bool,
}

impl Edge {
    fn closed(value: f64) -> Self {
        Self { value, open: false }
    }
}

/// Constraint describing a gap on one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GapConstraint {
    Range { lower: Edge, upper: Edge },
    Values { values: BTreeSet<String> },
}

/// Gap constraint on a named variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GapBound {
    pub variable_name: String,
    pub constraint: GapConstraint,
}

impl GapBound {
    /// `VAR >= lo AND VAR < hi`, `VAR = v` or `VAR in {A, B}`
    pub fn to_script(&self) -> String {
        let name = &self.variable_name;
        match &self.constraint {
            GapConstraint::Range { lower, upper } if lower.value == upper.value => {
                format!("{} = {}", name, lower.value)
            }
            GapConstraint::Range { lower, upper } => {
                let lower_op = if lower.open { ">" } else { ">=" };
                let upper_op = if upper.open { "<" } else { "<=" };
                format!(
                    "{} {} {} AND {} {} {}",
                    name, lower_op, lower.value, name, upper_op, upper.value
                )
            }
            GapConstraint::Values { values } => format!("{} in {}", name, render_set(values)),
        }
    }
}

/// A region no rule of the output group covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GapRecord {
    pub output_name: String,
    pub bounds: Vec<GapBound>,
    /// Rendered bounds, one per variable
    pub constraints: Vec<String>,
}

impl GapRecord {
    pub fn script(&self) -> String {
        self.constraints.join(" AND ")
    }
}

/// Result of a gap search over one output group
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GapReport {
    pub output_name: String,
    pub gaps: Vec<GapRecord>,
    pub issues: Vec<AnalysisIssue>,
    pub samples_drawn: usize,
    pub uncovered_samples: usize,
}

type BoundMap = BTreeMap<String, GapConstraint>;

/// Samples one output group for uncovered regions
pub struct GapSampler<'a, R: RuleRepository + ?Sized> {
    repo: &'a R,
    options: SamplingOptions,
    cancel: Option<CancellationToken>,
}

impl<'a, R: RuleRepository + ?Sized> GapSampler<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            options: SamplingOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Search the active rules in `rule_ids` producing `output_name`
    pub fn find_gaps(&self, output_name: &str, rule_ids: &[String]) -> Result<GapReport> {
        let snapshot = resolve_rules_matching(self.repo, rule_ids, |rule| {
            rule.is_active() && rule.output_name == output_name
        });
        let mut report = GapReport {
            output_name: output_name.to_string(),
            issues: snapshot.issues,
            ..GapReport::default()
        };
        if snapshot.rules.is_empty() {
            tracing::debug!(output_name, "No rules to sample");
            return Ok(report);
        }

        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let space = SampleSpace::build(&snapshot.rules, &snapshot.catalog)?;
        let matrix = space.draw(&mut rng, self.options.samples, &self.options.perturbations);

        let mut watch: Vec<BoundMap> = Vec::new();
        for row in 0..matrix.rows {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::info!(output_name, row, "Gap search cancelled");
                return Err(Error::Cancelled);
            }
            let sample = matrix.row(row);
            if snapshot.rules.iter().any(|rule| hits(rule, &space, &sample)) {
                continue;
            }
            report.uncovered_samples += 1;
            let bound = bound_for(&space, &snapshot.rules, &sample);
            if !watch.contains(&bound) {
                watch.push(bound);
            }
        }
        report.samples_drawn = matrix.rows;

        merge_categorical(&mut watch);
        report.gaps = watch
            .into_iter()
            .map(|bound| render(output_name, bound))
            .collect();

        tracing::info!(
            output_name,
            samples = report.samples_drawn,
            uncovered = report.uncovered_samples,
            gaps = report.gaps.len(),
            "Gap search finished"
        );
        Ok(report)
    }

    /// Run [`find_gaps`](Self::find_gaps) for every non-empty group
    pub fn run(&self, groups: &BTreeMap<String, Vec<String>>) -> Result<Vec<GapReport>> {
        let mut reports = Vec::new();
        for (output_name, rule_ids) in groups {
            if rule_ids.is_empty() {
                continue;
            }
            reports.push(self.find_gaps(output_name, rule_ids)?);
        }
        Ok(reports)
    }
}

/// Search one output group with default options and the given sample count
pub fn find_gaps<R: RuleRepository + ?Sized>(
    repo: &R,
    output_name: &str,
    rule_ids: &[String],
    n_samples: usize,
) -> Result<GapReport> {
    GapSampler::new(repo)
        .with_options(SamplingOptions {
            samples: n_samples,
            ..SamplingOptions::default()
        })
        .find_gaps(output_name, rule_ids)
}

/// Variables of one output group with their sampling pools
struct SampleSpace {
    variables: Vec<Variable>,
    index: BTreeMap<String, usize>,
    pools: Vec<Pool>,
}

enum Pool {
    Numeric { points: Vec<f64>, low: f64, high: f64 },
    Options(Vec<String>),
}

impl SampleSpace {
    fn build(rules: &[ResolvedRule], catalog: &Catalog) -> Result<Self> {
        let mut thresholds: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for criterion in rules.iter().flat_map(|r| &r.criteria) {
            let entry = thresholds.entry(criterion.variable_name.as_str()).or_default();
            if let Some(v) = criterion.value.as_number() {
                entry.push(v);
            }
        }

        let mut variables = Vec::with_capacity(thresholds.len());
        let mut index = BTreeMap::new();
        let mut pools = Vec::with_capacity(thresholds.len());
        for (name, mut values) in thresholds {
            let variable = catalog.get(name)?.clone();
            let pool = match &variable.kind {
                VariableKind::Numerical {
                    lower_bound,
                    upper_bound,
                    ..
                } => {
                    values.sort_by(f64::total_cmp);
                    values.dedup();
                    let mut points = Vec::with_capacity(values.len() + 2);
                    points.push(*lower_bound);
                    points.extend(values);
                    points.push(*upper_bound);
                    Pool::Numeric {
                        points,
                        low: *lower_bound,
                        high: *upper_bound,
                    }
                }
                VariableKind::Categorical { options } => Pool::Options(options.iter().cloned().collect()),
            };
            index.insert(name.to_string(), variables.len());
            variables.push(variable);
            pools.push(pool);
        }

        Ok(Self {
            variables,
            index,
            pools,
        })
    }

    fn value<'s>(&self, sample: &'s [&'s SampleValue], name: &str) -> Option<&'s SampleValue> {
        self.index.get(name).map(|&i| sample[i])
    }

    /// Draw `n` samples column by column
    fn draw(&self, rng: &mut StdRng, n: usize, perturbations: &[f64]) -> SampleMatrix {
        let perturbations: &[f64] = if perturbations.is_empty() {
            &[0.0]
        } else {
            perturbations
        };
        let columns: Vec<Vec<SampleValue>> = self
            .pools
            .iter()
            .map(|pool| match pool {
                Pool::Numeric { points, low, high } => (0..n)
                    .map(|_| {
                        let point = points[rng.random_range(0..points.len())];
                        let offset = perturbations[rng.random_range(0..perturbations.len())];
                        SampleValue::Number((point + offset).clamp(*low, *high))
                    })
                    .collect::<Vec<_>>(),
                Pool::Options(options) => (0..n)
                    .map(|_| SampleValue::Category(options[rng.random_range(0..options.len())].clone()))
                    .collect::<Vec<_>>(),
            })
            .collect();
        SampleMatrix { columns, rows: n }
    }
}

/// `rows × variables` samples, stored by column
struct SampleMatrix {
    columns: Vec<Vec<SampleValue>>,
    rows: usize,
}

impl SampleMatrix {
    fn row(&self, i: usize) -> Vec<&SampleValue> {
        self.columns.iter().map(|c| &c[i]).collect()
    }
}

/// A rule hits a sample when every one of its criteria accepts it
fn hits(rule: &ResolvedRule, space: &SampleSpace, sample: &[&SampleValue]) -> bool {
    rule.criteria.iter().all(|criterion| {
        space
            .value(sample, &criterion.variable_name)
            .is_some_and(|value| criterion.check(value))
    })
}

/// Tightest bracket around an uncovered sample
fn bound_for(space: &SampleSpace, rules: &[ResolvedRule], sample: &[&SampleValue]) -> BoundMap {
    let mut bound = BoundMap::new();
    for (variable, value) in space.variables.iter().zip(sample) {
        let constraint = match (&variable.kind, value) {
            (
                VariableKind::Numerical {
                    lower_bound,
                    upper_bound,
                    ..
                },
                _,
            ) => GapConstraint::Range {
                lower: Edge::closed(*lower_bound),
                upper: Edge::closed(*upper_bound),
            },
            (VariableKind::Categorical { .. }, v) => GapConstraint::Values {
                values: BTreeSet::from([v.to_string()]),
            },
        };
        bound.insert(variable.name.clone(), constraint);
    }

    for criterion in rules.iter().flat_map(|r| &r.criteria) {
        let Some(SampleValue::Number(x)) = space.value(sample, &criterion.variable_name) else {
            continue;
        };
        if let Some(GapConstraint::Range { lower, upper }) = bound.get_mut(&criterion.variable_name) {
            narrow(lower, upper, criterion, *x);
        }
    }
    bound
}

/// Move the bracket edges toward `x` using one criterion's threshold.
///
/// An edge at threshold `v` is open when `v` and `x` fall on different
/// sides of the criterion.
fn narrow(lower: &mut Edge, upper: &mut Edge, criterion: &Criterion, x: f64) {
    let Some(v) = criterion.value.as_number() else {
        return;
    };
    let open = criterion.check(&SampleValue::Number(v)) != criterion.check(&SampleValue::Number(x));

    if x == v {
        *lower = Edge::closed(v);
        *upper = Edge::closed(v);
    } else if x > v {
        if x - v < x - lower.value {
            *lower = Edge { value: v, open };
        } else if v == lower.value {
            lower.open |= open;
        }
    } else if v - x < upper.value - x {
        *upper = Edge { value: v, open };
    } else if v == upper.value {
        upper.open |= open;
    }
}

/// Merge gaps whose brackets differ only in one categorical variable
fn merge_categorical(watch: &mut Vec<BoundMap>) {
    'outer: loop {
        for i in 0..watch.len() {
            for j in (i + 1)..watch.len() {
                if let Some(name) = single_categorical_difference(&watch[i], &watch[j]) {
                    let other = watch.remove(j);
                    if let (
                        Some(GapConstraint::Values { values }),
                        Some(GapConstraint::Values { values: more }),
                    ) = (watch[i].get_mut(&name), other.get(&name))
                    {
                        values.extend(more.iter().cloned());
                    }
                    continue 'outer;
                }
            }
        }
        break;
    }
}

fn single_categorical_difference(a: &BoundMap, b: &BoundMap) -> Option<String> {
    if a.len() != b.len() {
        return None;
    }
    let mut differing = None;
    for (name, ca) in a {
        let cb = b.get(name)?;
        if ca == cb {
            continue;
        }
        match (ca, cb) {
            (GapConstraint::Values { .. }, GapConstraint::Values { .. }) if differing.is_none() => {
                differing = Some(name.clone());
            }
            _ => return None,
        }
    }
    differing
}

fn render(output_name: &str, bound: BoundMap) -> GapRecord {
    let bounds: Vec<GapBound> = bound
        .into_iter()
        .map(|(variable_name, constraint)| GapBound {
            variable_name,
            constraint,
        })
        .collect();
    GapRecord {
        output_name: output_name.to_string(),
        constraints: bounds.iter().map(GapBound::to_script).collect(),
        bounds,
    }
}
