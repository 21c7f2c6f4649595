//! End-to-end conflict sweeps over rulebooks

use pretty_assertions::assert_eq;
use rstest::rstest;
use rulecheck::{
    ConflictSweep, ConflictType, IssueKind, MemoryRepository, OverlapRegion, SetSemantics,
};

const VARIABLES: &str = r#"
variables:
  - { name: AGE, type: numerical, lower_bound: 18, upper_bound: 100, step: 1 }
  - { name: CITY, type: categorical, options: [HN, HCM, DN] }
"#;

fn repo(rules: &str) -> MemoryRepository {
    MemoryRepository::from_yaml(&format!("{}rules:\n{}", VARIABLES, rules)).unwrap()
}

fn age_rules() -> MemoryRepository {
    repo(r#"
  - { id: R1, document_id: D1, criteria: ["AGE >= 18", "AGE <= 30"], output_name: RISK, output_value: LOW }
  - { id: R2, document_id: D2, criteria: ["AGE >= 25", "AGE <= 40"], output_name: RISK, output_value: HIGH }
  - { id: R3, document_id: D2, criteria: ["AGE >= 41", "AGE <= 100"], output_name: RISK, output_value: LOW }
"#)
}

#[test]
fn test_overlapping_age_rules() {
    let repo = age_rules();
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();

    assert_eq!(report.pairs_checked, 3);
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!((conflict.rule_id1.as_str(), conflict.rule_id2.as_str()), ("R1", "R2"));
    assert_eq!((conflict.document_id1.as_str(), conflict.document_id2.as_str()), ("D1", "D2"));
    assert_eq!(conflict.conflict_type, ConflictType::Logic);
    assert_eq!(conflict.output_name, "RISK");
    assert_eq!(
        conflict.overlaps[0].region,
        OverlapRegion::Range { low: 25.0, high: 30.0 }
    );
    assert_eq!(conflict.script, vec!["25 <= AGE <= 30".to_string()]);
}

#[test]
fn test_rule_order_does_not_matter() {
    let repo = age_rules();
    let ids = vec!["R3".to_string(), "R2".to_string(), "R1".to_string()];
    let report = ConflictSweep::new(&repo).run(&ids, &[]).unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].rule_id1, "R1");
}

#[rstest]
// Disjoint after strict bounds move by one step
#[case("AGE < 25", "AGE >= 25", None)]
#[case("AGE > 30", "AGE <= 31", Some("31 <= AGE <= 31"))]
#[case("AGE = 40", "AGE >= 40", Some("40 <= AGE <= 40"))]
#[case("AGE = 40", "AGE = 41", None)]
#[case("CITY in [HN, HCM]", "CITY not in [HN]", Some("CITY in {HCM}"))]
#[case("CITY in [HN]", "CITY not in [HN]", None)]
fn test_pair_scenarios(#[case] left: &str, #[case] right: &str, #[case] expected: Option<&str>) {
    let repo = repo(&format!(
        "  - {{ id: A, criteria: [\"{}\"], output_name: RISK, output_value: LOW }}\n  - {{ id: B, criteria: [\"{}\"], output_name: RISK, output_value: LOW }}\n",
        left, right
    ));
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();

    match expected {
        Some(script) => {
            assert_eq!(report.conflicts.len(), 1, "{} vs {}", left, right);
            assert_eq!(report.conflicts[0].conflict_type, ConflictType::Duplicate);
            assert_eq!(report.conflicts[0].script, vec![script.to_string()]);
        }
        None => assert!(report.conflicts.is_empty(), "{} vs {}", left, right),
    }
}

#[test]
fn test_rules_without_shared_variables_always_conflict() {
    let repo = repo(r#"
  - { id: A, criteria: ["AGE >= 60"], output_name: RISK, output_value: HIGH }
  - { id: B, criteria: ["CITY in [DN]"], output_name: RISK, output_value: LOW }
"#);
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert!(report.conflicts[0].overlaps.is_empty());
}

#[test]
fn test_different_outputs_never_compared() {
    let repo = repo(r#"
  - { id: A, criteria: ["AGE >= 18"], output_name: RISK, output_value: HIGH }
  - { id: B, criteria: ["AGE >= 18"], output_name: LIMIT, output_value: 5000 }
"#);
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    assert_eq!(report.pairs_checked, 0);
    assert!(report.conflicts.is_empty());
}

#[test]
fn test_watch_list_limits_outputs() {
    let repo = repo(r#"
  - { id: A, criteria: ["AGE >= 18"], output_name: RISK, output_value: HIGH }
  - { id: B, criteria: ["AGE >= 20"], output_name: RISK, output_value: LOW }
  - { id: C, criteria: ["AGE >= 18"], output_name: LIMIT, output_value: 1 }
  - { id: D, criteria: ["AGE >= 18"], output_name: LIMIT, output_value: 2 }
"#);
    let report = ConflictSweep::new(&repo)
        .run(&repo.rule_ids(), &["LIMIT".to_string()])
        .unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].output_name, "LIMIT");
}

#[test]
fn test_set_semantics_changes_verdict() {
    // Under intersection R1 admits nothing; under union it admits {HN, HCM, DN}
    let repo = repo(r#"
  - { id: A, criteria: ["CITY in [HN]", "CITY not in [HN]"], output_name: RISK, output_value: HIGH }
  - { id: B, criteria: ["CITY in [DN]"], output_name: RISK, output_value: LOW }
"#);
    let ids = repo.rule_ids();

    let strict = ConflictSweep::new(&repo).run(&ids, &[]).unwrap();
    assert!(strict.conflicts.is_empty());

    let legacy = ConflictSweep::new(&repo)
        .with_semantics(SetSemantics::Union)
        .run(&ids, &[])
        .unwrap();
    assert_eq!(legacy.conflicts.len(), 1);
    assert_eq!(legacy.conflicts[0].script, vec!["CITY in {DN}".to_string()]);
}

#[test]
fn test_unknown_variable_reported_not_fatal() {
    let repo = repo(r#"
  - { id: A, criteria: ["AGE >= 18"], output_name: RISK, output_value: HIGH }
  - { id: B, criteria: ["INCOME >= 1000"], output_name: RISK, output_value: LOW }
  - { id: C, criteria: ["AGE <= 20"], output_name: RISK, output_value: LOW }
"#);
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].rule_id, "B");
    assert_eq!(report.conflicts.len(), 1);
}

#[test]
fn test_repeated_equality_never_conflicts() {
    let repo = repo(r#"
  - { id: A, criteria: ["AGE = 40", "AGE = 40"], output_name: RISK, output_value: LOW }
  - { id: B, criteria: ["AGE >= 40"], output_name: RISK, output_value: HIGH }
"#);
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    assert_eq!(report.pairs_checked, 1);
    assert!(report.conflicts.is_empty());
}

#[test]
fn test_zero_step_variable_reported_not_fatal() {
    let repo = MemoryRepository::from_yaml(
        r#"
variables:
  - { name: AGE, type: numerical, lower_bound: 18, upper_bound: 100, step: 1 }
  - { name: SCORE, type: numerical, lower_bound: 0, upper_bound: 100, step: 0 }
rules:
  - { id: A, criteria: ["SCORE > 30"], output_name: RISK, output_value: LOW }
  - { id: B, criteria: ["SCORE <= 30"], output_name: RISK, output_value: HIGH }
  - { id: C, criteria: ["AGE >= 18"], output_name: RISK, output_value: HIGH }
"#,
    )
    .unwrap();
    let report = ConflictSweep::new(&repo).run(&repo.rule_ids(), &[]).unwrap();
    let ids: Vec<&str> = report.issues.iter().map(|i| i.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert!(report.issues.iter().all(|i| i.kind == IssueKind::InvalidVariable));
    assert!(report.conflicts.is_empty());
}
