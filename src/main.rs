//! rulecheck CLI - Command-line interface
//!
//! Commands:
//!   conflicts - Find rules that fire on the same inputs
//!   gaps      - Sample for inputs no rule covers
//!   analyze   - Both, as one report
//!   lint      - Check a rule script's format
//!   schema    - Print JSON schema for an output type

mod cli;

use cli::*;
use rulecheck::VERSION;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "conflicts" => cmd_conflicts(&args[2..]),
        "gaps" => cmd_gaps(&args[2..]),
        "analyze" => cmd_analyze(&args[2..]),
        "lint" => cmd_lint(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("rulecheck {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `warn` level
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    println!(
        r#"
rulecheck - Conflict and coverage-gap analysis for business rules

USAGE:
    rulecheck <COMMAND> [OPTIONS]

COMMANDS:
    conflicts <rulebook>             Find overlapping rules per output
    gaps <rulebook>                  Sample for uncovered input regions
    analyze <rulebook>               Conflicts and gaps in one report
    lint <rules.txt>                 Check <and>/<thn>/<eor> rule script format
    schema [name]                    Print JSON schema (conflicts, gaps, report, rulebook, config)
    version                          Print version

OPTIONS:
    --output <NAME>                  Only analyze this output (repeatable)
    --samples <N>                    Samples per output group (default: 500)
    --seed <S>                       Fixed sampling seed for reproducible gaps
    --semantics <intersection|union> How in/not in criteria on one variable combine
    --config <DIR>                   Directory holding rulecheck.yaml (default: .)
    --json                           JSON output format

Exit status is 1 when conflicts or gaps are found.

EXAMPLES:
    rulecheck conflicts rules.yaml --output RISK
    rulecheck gaps rules.yaml --samples 2000 --seed 7
    rulecheck analyze rules.json --json > report.json
    rulecheck lint extracted_rules.txt
"#
    );
}
