//! Rule script format check

use super::util::{has_flag, print_json};
use rulecheck::*;
use std::fs;

pub fn cmd_lint(args: &[String]) -> Result<()> {
    let Some(path) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err("Usage: rulecheck lint <rules.txt> [--json]".into());
    };
    let script = fs::read_to_string(path).map_err(Error::Io)?;
    let rules = check_rules(&script)?;

    if has_flag(args, "--json") {
        return print_json(&rules);
    }

    println!("✓ {} rule(s) well-formed", rules.len());
    for rule in &rules {
        let conditions: Vec<String> = rule.criteria.iter().map(Criterion::to_script).collect();
        println!(
            "  {} → {} = {}",
            conditions.join(" AND "),
            rule.output_name,
            rule.output_value
        );
    }
    Ok(())
}
