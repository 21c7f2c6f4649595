//! Analysis commands: conflicts, gaps, analyze

use super::util::{has_flag, load_config, load_rulebook, print_json};
use rulecheck::analysis::report::{conflict_section, gap_section};
use rulecheck::*;

const CONFLICTS_USAGE: &str =
    "Usage: rulecheck conflicts <rulebook> [--output NAME]... [--json] [--config DIR]";
const GAPS_USAGE: &str =
    "Usage: rulecheck gaps <rulebook> [--output NAME]... [--samples N] [--seed S] [--json]";
const ANALYZE_USAGE: &str = "Usage: rulecheck analyze <rulebook> [OPTIONS]";

pub fn cmd_conflicts(args: &[String]) -> Result<()> {
    let repo = load_rulebook(args, CONFLICTS_USAGE)?;
    let config = load_config(args)?;
    let report = run_conflicts(&repo, &config)?;

    if has_flag(args, "--json") {
        print_json(&report)?;
    } else {
        print!("{}", conflict_section(&report));
    }

    if report.has_conflicts() {
        Err(format!("{} conflict(s) found", report.conflicts.len()).into())
    } else {
        Ok(())
    }
}

pub fn cmd_gaps(args: &[String]) -> Result<()> {
    let repo = load_rulebook(args, GAPS_USAGE)?;
    let config = load_config(args)?;
    let reports = run_gaps(&repo, &config)?;

    if has_flag(args, "--json") {
        print_json(&reports)?;
    } else {
        print!("{}", gap_section(&reports));
    }

    let total: usize = reports.iter().map(|r| r.gaps.len()).sum();
    if total > 0 {
        Err(format!("{} gap(s) found", total).into())
    } else {
        Ok(())
    }
}

pub fn cmd_analyze(args: &[String]) -> Result<()> {
    let repo = load_rulebook(args, ANALYZE_USAGE)?;
    let config = load_config(args)?;
    let report = AnalysisReport::new(run_conflicts(&repo, &config)?, run_gaps(&repo, &config)?);

    if has_flag(args, "--json") {
        print_json(&report)?;
    } else {
        print!("{}", report.to_report());
    }

    if report.has_findings() {
        Err("Analysis found conflicts or gaps".into())
    } else {
        Ok(())
    }
}

fn run_conflicts(repo: &MemoryRepository, config: &AnalysisConfig) -> Result<SweepReport> {
    ConflictSweep::new(repo)
        .with_semantics(config.conflicts.set_semantics)
        .run(&repo.rule_ids(), &config.watch)
}

fn run_gaps(repo: &MemoryRepository, config: &AnalysisConfig) -> Result<Vec<GapReport>> {
    GapSampler::new(repo)
        .with_options(config.sampling())
        .run(&repo.groups_by_output(&config.watch))
}
