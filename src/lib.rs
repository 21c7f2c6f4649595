// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # rulecheck: conflict and coverage-gap analysis for business rules
//!
//! Rules extracted from policy documents are conjunctions of criteria over
//! typed input variables, each concluding one output value. Over time a
//! rulebook grows rules that fire on the same inputs with different
//! outcomes, and input regions that no rule handles. rulecheck finds both.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rulecheck::{ConflictSweep, GapSampler, MemoryRepository, SamplingOptions};
//!
//! let repo = MemoryRepository::from_yaml(r#"
//! variables:
//!   - { name: AGE, type: numerical, lower_bound: 18, upper_bound: 100, step: 1 }
//! rules:
//!   - { id: R1, document_id: D1, criteria: ["AGE >= 18", "AGE <= 30"], output_name: RISK, output_value: LOW }
//!   - { id: R2, document_id: D1, criteria: ["AGE >= 25", "AGE <= 40"], output_name: RISK, output_value: HIGH }
//! "#)?;
//!
//! let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[])?;
//! for c in &report.conflicts {
//!     println!("{} vs {}: {}", c.rule_id1, c.rule_id2, c.script.join(" AND "));
//! }
//!
//! let gaps = GapSampler::new(&repo)
//!     .with_options(SamplingOptions { seed: Some(7), ..Default::default() })
//!     .find_gaps("RISK", &repo.rule_ids())?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Rulebook (YAML / JSON)                                      │
//! │       │                                                      │
//! │       └──► MemoryRepository ──► RuleRepository               │
//! │                                     │                        │
//! │            resolve_rules ◄──────────┘   (bad rules → issues) │
//! │                 │                                            │
//! │                 ├──► ConflictSweep ──► SweepReport           │
//! │                 │      └── ConflictScanner ── build_range    │
//! │                 │                          └── set_overlap   │
//! │                 │                                            │
//! │                 └──► GapSampler ──► GapReport (sampled)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Gap search is randomized: an empty gap list means no sample fell outside
//! every rule, not that coverage is proven. Fix `SamplingOptions::seed` for
//! reproducible results.

pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod parse;
pub mod repository;

// Re-exports
pub use analysis::{
    build_range, detect, find_gaps, sweep, AnalysisReport, ConflictRecord, ConflictScanner,
    ConflictSweep, ConflictType, Edge, GapBound, GapConstraint, GapRecord, GapReport, GapSampler,
    Interval, OverlapRegion, OverlapResult, SamplingOptions, SetSemantics, SweepReport,
};
pub use config::{AnalysisConfig, ConfigOverrides};
pub use error::{Error, Result};
pub use model::{
    Criterion, CriterionValue, Operator, Rule, RuleStatus, SampleValue, Variable, VariableKind,
};
pub use parse::{check_rules, parse_criterion, parse_value, ScriptRule};
pub use repository::{
    resolve_rules, AnalysisIssue, IssueKind, MemoryRepository, RuleRepository, Rulebook,
};

/// Version of rulecheck
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
