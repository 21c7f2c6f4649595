//! Combined conflict and gap report

use super::conflict::{ConflictType, SweepReport};
use super::gap::GapReport;
use crate::repository::AnalysisIssue;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Everything one `analyze` run found
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub conflicts: SweepReport,
    pub gaps: Vec<GapReport>,
}

impl AnalysisReport {
    pub fn new(conflicts: SweepReport, gaps: Vec<GapReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            conflicts,
            gaps,
        }
    }

    pub fn gap_count(&self) -> usize {
        self.gaps.iter().map(|g| g.gaps.len()).sum()
    }

    /// True when any conflict or gap was found
    pub fn has_findings(&self) -> bool {
        self.conflicts.has_conflicts() || self.gap_count() > 0
    }

    /// Format as human-readable report
    pub fn to_report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Analysis: {}\n",
            if self.has_findings() {
                "✗ FINDINGS"
            } else {
                "✓ CLEAN"
            }
        ));
        out.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&conflict_section(&self.conflicts));
        out.push('\n');
        out.push_str(&gap_section(&self.gaps));
        out
    }
}

/// Text rendering of a conflict sweep
pub fn conflict_section(report: &SweepReport) -> String {
    let mut out = format!(
        "Conflicts: {} ({} pairs checked)\n",
        report.conflicts.len(),
        report.pairs_checked
    );
    for c in &report.conflicts {
        let tag = match c.conflict_type {
            ConflictType::Duplicate => "DUPLICATE",
            ConflictType::Logic => "LOGIC",
        };
        out.push_str(&format!(
            "  {} ↔ {} [{}] on {}\n",
            c.rule_id1, c.rule_id2, tag, c.output_name
        ));
        if c.script.is_empty() {
            out.push_str("    → no shared variables\n");
        }
        for line in &c.script {
            out.push_str(&format!("    → {}\n", line));
        }
    }
    out.push_str(&issue_lines(&report.issues));
    out
}

/// Text rendering of gap reports, one block per output
pub fn gap_section(reports: &[GapReport]) -> String {
    let total: usize = reports.iter().map(|r| r.gaps.len()).sum();
    let mut out = format!("Gaps: {} (sampled, not exhaustive)\n", total);
    for report in reports {
        out.push_str(&format!(
            "  {}: {} gap(s), {}/{} samples uncovered\n",
            report.output_name,
            report.gaps.len(),
            report.uncovered_samples,
            report.samples_drawn
        ));
        for gap in &report.gaps {
            out.push_str(&format!("    → {}\n", gap.script()));
        }
        out.push_str(&issue_lines(&report.issues));
    }
    out
}

fn issue_lines(issues: &[AnalysisIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  ! {} skipped: {}\n", i.rule_id, i.message))
        .collect()
}
