//! Pairwise conflict detection
//!
//! Two rules on the same output conflict when their condition regions
//! intersect: every variable both rules constrain must overlap. Variables
//! constrained by only one of the two rules do not restrict the other, so
//! two rules with no shared variable always intersect.
//!
//! The sweep is O(n²) in the rules of one output group. Groups are small
//! (tens to low hundreds of rules), so pairs are scanned directly.

use super::overlap::{detect, OverlapResult};
use super::set_overlap::SetSemantics;
use crate::error::{Error, Result};
use crate::repository::{resolve_rules_matching, AnalysisIssue, Catalog, ResolvedRule, RuleRepository};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Whether two conflicting rules agree on the output value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Same output value: one rule is redundant
    Duplicate,
    /// Different output values for the same inputs
    Logic,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::Duplicate => write!(f, "duplicate"),
            ConflictType::Logic => write!(f, "logic"),
        }
    }
}

/// Two rules whose conditions can hold at the same time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConflictRecord {
    pub rule_id1: String,
    pub rule_id2: String,
    pub document_id1: String,
    pub document_id2: String,
    pub conflict_type: ConflictType,
    /// Intersection region, one entry per shared variable
    pub overlaps: Vec<OverlapResult>,
    /// Rendered overlaps (`25 <= AGE <= 30`, `CITY in {HN}`)
    pub script: Vec<String>,
    pub output_name: String,
}

/// Result of a conflict sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SweepReport {
    pub conflicts: Vec<ConflictRecord>,
    /// Rules left out because their data could not be validated
    pub issues: Vec<AnalysisIssue>,
    pub pairs_checked: usize,
}

impl SweepReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Compares two resolved rules
#[derive(Debug, Clone, Copy)]
pub struct ConflictScanner<'a> {
    catalog: &'a Catalog,
    semantics: SetSemantics,
}

impl<'a> ConflictScanner<'a> {
    pub fn new(catalog: &'a Catalog, semantics: SetSemantics) -> Self {
        Self { catalog, semantics }
    }

    /// Overlap on every shared variable, or `None` if some shared variable
    /// has no overlap. No shared variables yields `Some(vec![])`.
    pub fn conflicts(
        &self,
        rule_a: &ResolvedRule,
        rule_b: &ResolvedRule,
    ) -> Result<Option<Vec<OverlapResult>>> {
        let groups_a = rule_a.criteria_by_variable();
        let groups_b = rule_b.criteria_by_variable();

        let mut results = Vec::new();
        for (name, criteria_a) in &groups_a {
            let Some(criteria_b) = groups_b.get(name) else {
                continue;
            };
            let variable = self.catalog.get(name)?;
            match detect(variable, criteria_a, criteria_b, self.semantics) {
                Some(overlap) => results.push(overlap),
                None => return Ok(None),
            }
        }
        Ok(Some(results))
    }
}

/// Scans every same-output pair of active rules
pub struct ConflictSweep<'a, R: RuleRepository + ?Sized> {
    repo: &'a R,
    semantics: SetSemantics,
    cancel: Option<CancellationToken>,
}

impl<'a, R: RuleRepository + ?Sized> ConflictSweep<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            semantics: SetSemantics::default(),
            cancel: None,
        }
    }

    pub fn with_semantics(mut self, semantics: SetSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sweep `rule_ids`; only active rules whose output is in `watch`
    /// take part (every output when `watch` is empty).
    pub fn run(&self, rule_ids: &[String], watch: &[String]) -> Result<SweepReport> {
        let mut ids = rule_ids.to_vec();
        ids.sort();
        ids.dedup();

        let snapshot = resolve_rules_matching(self.repo, &ids, |rule| {
            rule.is_active() && (watch.is_empty() || watch.contains(&rule.output_name))
        });
        let scanner = ConflictScanner::new(&snapshot.catalog, self.semantics);
        let rules = &snapshot.rules;

        let mut report = SweepReport {
            issues: snapshot.issues.clone(),
            ..SweepReport::default()
        };

        for (i, rule_a) in rules.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::info!(rule_id = %rule_a.id(), "Conflict sweep cancelled");
                return Err(Error::Cancelled);
            }
            for rule_b in &rules[i + 1..] {
                if rule_a.rule.output_name != rule_b.rule.output_name {
                    continue;
                }
                report.pairs_checked += 1;
                match scanner.conflicts(rule_a, rule_b) {
                    Ok(Some(overlaps)) => report.conflicts.push(record(rule_a, rule_b, overlaps)),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            rule_id1 = %rule_a.id(),
                            rule_id2 = %rule_b.id(),
                            error = %e,
                            "Skipping rule pair"
                        );
                        report.issues.push(AnalysisIssue::from_error(rule_a.id(), &e));
                    }
                }
            }
        }

        tracing::info!(
            rules = rules.len(),
            pairs = report.pairs_checked,
            conflicts = report.conflicts.len(),
            issues = report.issues.len(),
            "Conflict sweep finished"
        );
        Ok(report)
    }
}

fn record(rule_a: &ResolvedRule, rule_b: &ResolvedRule, overlaps: Vec<OverlapResult>) -> ConflictRecord {
    let conflict_type = if rule_a.rule.output_value == rule_b.rule.output_value {
        ConflictType::Duplicate
    } else {
        ConflictType::Logic
    };
    ConflictRecord {
        rule_id1: rule_a.rule.id.clone(),
        rule_id2: rule_b.rule.id.clone(),
        document_id1: rule_a.rule.document_id.clone(),
        document_id2: rule_b.rule.document_id.clone(),
        conflict_type,
        script: overlaps.iter().map(OverlapResult::to_script).collect(),
        overlaps,
        output_name: rule_a.rule.output_name.clone(),
    }
}

/// Sweep with default settings
pub fn sweep<R: RuleRepository + ?Sized>(
    repo: &R,
    rule_ids: &[String],
    watch: &[String],
) -> Result<SweepReport> {
    ConflictSweep::new(repo).run(rule_ids, watch)
}
