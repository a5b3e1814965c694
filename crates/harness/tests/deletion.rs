use crosswalk_core::{Mapping, MappingType};
use crosswalk_engine::ErrorClass;
use crosswalk_harness::{TestEngine, court_case};

fn appearance(legacy: i64, parent: &str) -> Mapping<i64> {
    Mapping::new(legacy, format!("app-{legacy}"), MappingType::created("DPS")).with_parent(parent)
}

// ============================================================================
// Cascading deletes
// ============================================================================

#[test]
fn delete_by_parent_leaves_other_parents_alone() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let appearances = t.court_appearances()?;
    appearances.register_mapping(appearance(1, "case-1"))?;
    appearances.register_mapping(appearance(2, "case-1"))?;
    appearances.register_mapping(appearance(3, "case-2"))?;

    assert_eq!(appearances.delete_by_parent_id("case-1")?, 2);

    assert_eq!(appearances.find_by_legacy_id(&1).unwrap_err().class(), ErrorClass::NotFound);
    assert_eq!(appearances.find_by_legacy_id(&2).unwrap_err().class(), ErrorClass::NotFound);
    assert_eq!(appearances.find_by_legacy_id(&3)?.parent_id.as_deref(), Some("case-2"));

    assert_eq!(appearances.delete_by_parent_id("case-1")?, 0);
    Ok(())
}

#[test]
fn aggregate_delete_spans_every_child_kind() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    t.court_cases()?.register_mapping(court_case(1, "case-1"))?;
    t.court_appearances()?.register_mapping(appearance(10, "case-1"))?;
    t.court_charges()?.register_mapping(
        Mapping::new(20, "chg-20".to_string(), MappingType::Migrated).with_parent("case-1"),
    )?;
    t.sentences()?.register_mapping(
        Mapping::new((5, 1), "s-1".to_string(), MappingType::Migrated).with_parent("case-1"),
    )?;
    t.sentences()?.register_mapping(
        Mapping::new((5, 2), "s-2".to_string(), MappingType::Migrated).with_parent("case-2"),
    )?;

    assert_eq!(t.engine.delete_aggregate("case-1")?, 3);

    // The parent's own row has no parent column and stays.
    assert_eq!(t.court_cases()?.find_by_legacy_id(&1)?.new_id, "case-1");
    assert!(t.court_charges()?.find_by_legacy_id(&20).is_err());
    assert_eq!(t.sentences()?.find_by_legacy_id(&(5, 2))?.new_id, "s-2");
    Ok(())
}

// ============================================================================
// Checkpoint rollback
// ============================================================================

#[test]
fn delete_created_after_rolls_back_to_checkpoint() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    t.seed_court_cases("run-1", 1, 2)?;
    let checkpoint = t.engine.checkpoint()?;
    t.seed_court_cases("run-1", 3, 2)?;

    let cases = t.court_cases()?;
    assert_eq!(cases.delete_created_after(checkpoint)?, 2);
    assert_eq!(cases.count_by_label("run-1", true)?, 2);
    assert!(cases.find_by_legacy_id(&1).is_ok());
    assert!(cases.find_by_legacy_id(&3).is_err());
    Ok(())
}

#[test]
fn stamp_of_a_row_is_a_usable_checkpoint() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let seeded = t.seed_court_cases("run-1", 1, 3)?;
    let cases = t.court_cases()?;
    let middle = cases.find_by_new_id(&seeded[1].new_id)?;

    assert_eq!(cases.delete_created_after(middle.when_created.unwrap())?, 1);
    assert!(cases.find_by_legacy_id(&2).is_ok());
    assert!(cases.find_by_legacy_id(&3).is_err());
    Ok(())
}

#[test]
fn rollback_spans_every_kind() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    t.seed_court_cases("run-1", 1, 1)?;
    let checkpoint = t.engine.checkpoint()?;
    t.seed_court_cases("run-1", 2, 1)?;
    t.court_appearances()?.register_mapping(appearance(7, "dps-2"))?;

    assert_eq!(t.engine.rollback_after(checkpoint)?, 2);
    assert!(t.court_cases()?.find_by_legacy_id(&1).is_ok());
    assert!(t.court_appearances()?.find_by_legacy_id(&7).is_err());
    Ok(())
}

// ============================================================================
// Single deletes
// ============================================================================

#[test]
fn delete_by_new_id_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let cases = t.court_cases()?;
    cases.register_mapping(court_case(1, "d1"))?;

    assert!(cases.delete_by_new_id(&"d1".to_string())?);
    assert!(!cases.delete_by_new_id(&"d1".to_string())?);
    assert!(!cases.delete_by_new_id(&"never".to_string())?);

    // Both keys are free again.
    assert!(cases.register_mapping(court_case(1, "d1-again"))?.is_success());
    Ok(())
}
