//! Rulebook loading and rule script checks

use rstest::rstest;
use rulecheck::repository::CriterionEntry;
use rulecheck::{
    check_rules, AnalysisConfig, ConflictSweep, Error, MemoryRepository, Operator,
    RuleRepository, Rulebook,
};
use std::fs;

const RULEBOOK_JSON: &str = r#"{
  "variables": [
    { "name": "AGE", "type": "numerical", "lower_bound": 18, "upper_bound": 100, "step": 1 },
    { "name": "CITY", "type": "categorical", "options": ["HN", "HCM"] }
  ],
  "rules": [
    {
      "id": "R1",
      "document_id": "DOC1",
      "criteria": ["AGE >= 18", { "variable": "CITY", "operator": "in", "value": ["HN"] }],
      "output_name": "RISK",
      "output_value": "LOW"
    },
    {
      "id": "R2",
      "document_id": "DOC1",
      "status": "inactive",
      "criteria": ["AGE <= 30"],
      "output_name": "RISK",
      "output_value": "HIGH"
    }
  ]
}"#;

#[test]
fn test_load_json_rulebook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.json");
    fs::write(&path, RULEBOOK_JSON).unwrap();

    let rulebook = Rulebook::load(&path).unwrap();
    assert_eq!(rulebook.rules.len(), 2);
    assert!(matches!(rulebook.rules[0].criteria[1], CriterionEntry::Structured { .. }));

    let repo = MemoryRepository::load(&path).unwrap();
    let r1 = repo.get_rule("R1").unwrap();
    assert_eq!(r1.criterion_ids, vec!["R1#0".to_string(), "R1#1".to_string()]);
    let city = repo.get_criterion("R1#1").unwrap();
    assert_eq!(city.operator, Operator::In);
    assert!(!repo.get_rule("R2").unwrap().is_active());
}

#[test]
fn test_inactive_rules_skipped_in_sweep() {
    let repo = MemoryRepository::from_rulebook(Rulebook::from_json(RULEBOOK_JSON).unwrap()).unwrap();
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    assert_eq!(report.pairs_checked, 0);
    assert!(report.conflicts.is_empty());
}

#[test]
fn test_yaml_rulebook_with_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("rules.yaml"),
        r#"
variables:
  - { name: AGE, type: numerical, lower_bound: 0, upper_bound: 120 }
rules:
  - { id: A, criteria: ["AGE >= 65"], output_name: TIER, output_value: 1 }
  - { id: B, criteria: ["AGE >= 60"], output_name: TIER, output_value: 2 }
"#,
    )
    .unwrap();
    fs::write(dir.path().join("rulecheck.yaml"), "version: 1\nwatch: [TIER]\n").unwrap();

    let repo = MemoryRepository::load(&dir.path().join("rules.yaml")).unwrap();
    let config = AnalysisConfig::load_or_default(dir.path()).unwrap();
    let report = ConflictSweep::new(&repo)
        .with_semantics(config.conflicts.set_semantics)
        .run(&repo.rule_ids(), &config.watch)
        .unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].script, vec!["65 <= AGE <= 120".to_string()]);
}

#[test]
fn test_bad_script_criterion_rejected() {
    let err = MemoryRepository::from_yaml(
        r#"
rules:
  - { id: A, criteria: ["AGE >= __import__('os')"], output_name: TIER, output_value: 1 }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_duplicate_rule_rejected() {
    let result = MemoryRepository::from_yaml(
        r#"
rules:
  - { id: A, criteria: [], output_name: TIER, output_value: 1 }
  - { id: A, criteria: [], output_name: TIER, output_value: 2 }
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_check_rule_script() {
    let rules = check_rules(
        "AGE >= 18 <and> CITY in ['HN', 'HCM'] <thn> RISK = LOW <eor>\n\
         AGE < 18 <thn> RISK = HIGH <eor>",
    )
    .unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].criteria.len(), 2);
    assert_eq!(rules[0].output_name, "RISK");
    assert_eq!(rules[1].output_value, "HIGH");
}

#[rstest]
#[case("AGE >= 18 <thn> RISK = LOW")]
#[case("AGE >= 18 <or> AGE < 10 <thn> RISK = LOW <eor>")]
#[case("AGE >= 18 <and> RISK = LOW <eor>")]
#[case("AGE >> 18 <thn> RISK = LOW <eor>")]
#[case("age >= 18 <thn> RISK = LOW <eor>")]
#[case("AGE >= 18 <thn> RISK > LOW <eor>")]
fn test_malformed_rule_scripts(#[case] script: &str) {
    assert!(matches!(check_rules(script), Err(Error::RuleFormat(_))), "{}", script);
}
