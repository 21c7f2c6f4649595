//! JSON schema command

use rulecheck::*;

pub fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: conflicts, gaps, report, rulebook, config");
            Ok(())
        }
        "conflicts" => print_schema::<SweepReport>(),
        "gaps" => print_schema::<Vec<GapReport>>(),
        "report" => print_schema::<AnalysisReport>(),
        "rulebook" => print_schema::<Rulebook>(),
        "config" => print_schema::<AnalysisConfig>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
