//! CLI utility helpers

use rulecheck::{AnalysisConfig, ConfigOverrides, Error, MemoryRepository, Result, SetSemantics};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Value following `flag`, if present
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Every value of a repeatable flag (`--output A --output B`)
pub fn flag_values(args: &[String], flag: &str) -> Vec<String> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == flag)
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect()
}

/// Parse the value of `flag` as `T`
pub fn parse_flag<T: FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Other(format!("Invalid value for {}: {}", flag, raw))),
        None => Ok(None),
    }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Load `rulecheck.yaml` from `--config DIR` (default: current directory)
/// and apply command-line overrides.
pub fn load_config(args: &[String]) -> Result<AnalysisConfig> {
    let dir = match flag_value(args, "--config") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().map_err(Error::Io)?,
    };
    let base = AnalysisConfig::load_or_default(&dir)?;

    let watch = flag_values(args, "--output");
    let set_semantics = match flag_value(args, "--semantics") {
        Some("intersection") => Some(SetSemantics::Intersection),
        Some("union") => Some(SetSemantics::Union),
        Some(other) => return Err(format!("Unknown set semantics: {}", other).into()),
        None => None,
    };
    let overrides = ConfigOverrides {
        samples: parse_flag(args, "--samples")?,
        seed: parse_flag(args, "--seed")?,
        watch: (!watch.is_empty()).then_some(watch),
        set_semantics,
    };
    Ok(base.merge(&overrides))
}

/// Load the rulebook named by the first argument
pub fn load_rulebook(args: &[String], usage: &str) -> Result<MemoryRepository> {
    let path = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| Error::Other(usage.to_string()))?;
    MemoryRepository::load(Path::new(path))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
