use crosswalk_core::{Mapping, MappingType};
use crosswalk_engine::{ErrorClass, kinds};
use crosswalk_harness::{TestEngine, court_case};
use uuid::Uuid;

fn owned_case(legacy: i64, owner: &str) -> Mapping<i64> {
    court_case(legacy, &format!("case-{legacy}")).with_owner(owner)
}

fn owned_appearance(legacy: i64, parent: &str, owner: &str) -> Mapping<i64> {
    Mapping::new(legacy, format!("app-{legacy}"), MappingType::Migrated)
        .with_parent(parent)
        .with_owner(owner)
}

#[test]
fn rewrite_owner_touches_only_that_owner() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let cases = t.court_cases()?;
    cases.register_mapping(owned_case(1, "A1111AA"))?;
    cases.register_mapping(owned_case(2, "A1111AA"))?;
    cases.register_mapping(owned_case(3, "B2222BB"))?;
    cases.register_mapping(court_case(4, "case-4"))?;

    assert_eq!(cases.rewrite_owner("A1111AA", "C3333CC")?, 2);

    assert_eq!(cases.find_by_legacy_id(&1)?.owner_id.as_deref(), Some("C3333CC"));
    assert_eq!(cases.find_by_legacy_id(&2)?.owner_id.as_deref(), Some("C3333CC"));
    assert_eq!(cases.find_by_legacy_id(&3)?.owner_id.as_deref(), Some("B2222BB"));
    assert_eq!(cases.find_by_legacy_id(&4)?.owner_id, None);

    assert_eq!(cases.rewrite_owner("A1111AA", "C3333CC")?, 0);
    Ok(())
}

#[test]
fn aggregate_rewrite_returns_changed_rows() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let appearances = t.court_appearances()?;
    appearances.register_mapping(owned_appearance(1, "case-1", "A1111AA"))?;
    appearances.register_mapping(owned_appearance(2, "case-1", "A1111AA"))?;
    appearances.register_mapping(owned_appearance(3, "case-2", "A1111AA"))?;

    let changed = appearances.rewrite_owner_for_aggregate("case-1", "B2222BB")?;
    let mut legacy_ids: Vec<i64> = changed.iter().map(|m| m.legacy_id).collect();
    legacy_ids.sort();
    assert_eq!(legacy_ids, vec![1, 2]);
    assert!(changed.iter().all(|m| m.owner_id.as_deref() == Some("B2222BB")));
    assert!(changed.iter().all(|m| m.when_created.is_some()));

    assert_eq!(appearances.find_by_legacy_id(&3)?.owner_id.as_deref(), Some("A1111AA"));
    assert!(appearances.rewrite_owner_for_aggregate("case-9", "B2222BB")?.is_empty());
    Ok(())
}

#[test]
fn aggregate_rewrite_needs_a_parent_column() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let err = t
        .court_cases()?
        .rewrite_owner_for_aggregate("case-1", "B2222BB")
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    Ok(())
}

#[test]
fn merge_propagates_across_kinds() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    t.court_cases()?.register_mapping(owned_case(1, "A1111AA"))?;
    t.court_appearances()?
        .register_mapping(owned_appearance(10, "case-1", "A1111AA"))?;
    t.court_appearances()?
        .register_mapping(owned_appearance(11, "case-1", "A1111AA"))?;
    t.alerts()?.register_mapping(
        Mapping::new((9, 1), Uuid::now_v7(), MappingType::Migrated).with_owner("A1111AA"),
    )?;
    t.court_charges()?.register_mapping(
        Mapping::new(30, "chg-30".to_string(), MappingType::Migrated).with_owner("Z9999ZZ"),
    )?;

    let mut changed = t.engine.propagate_merge("A1111AA", "B2222BB")?;
    changed.sort();
    assert_eq!(
        changed,
        vec![
            (kinds::ALERTS.table, 1),
            (kinds::COURT_APPEARANCES.table, 2),
            (kinds::COURT_CASES.table, 1),
        ]
    );
    assert_eq!(
        t.court_charges()?.find_by_legacy_id(&30)?.owner_id.as_deref(),
        Some("Z9999ZZ")
    );
    Ok(())
}

#[test]
fn blank_or_oversized_owner_ids_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let cases = t.court_cases()?;
    cases.register_mapping(owned_case(1, "A1111AA"))?;
    let appearances = t.court_appearances()?;
    appearances.register_mapping(owned_appearance(2, "case-1", "A1111AA"))?;

    let oversized = "x".repeat(200);
    for bad in ["", "   ", oversized.as_str()] {
        let err = cases.rewrite_owner("A1111AA", bad).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{bad:?}");
        let err = cases.rewrite_owner(bad, "B2222BB").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{bad:?}");
        let err = appearances.rewrite_owner_for_aggregate("case-1", bad).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{bad:?}");
        let err = appearances.rewrite_owner_for_aggregate(bad, "B2222BB").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{bad:?}");
        let err = t.engine.propagate_merge("A1111AA", bad).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{bad:?}");
    }

    assert_eq!(cases.find_by_legacy_id(&1)?.owner_id.as_deref(), Some("A1111AA"));
    assert_eq!(appearances.find_by_legacy_id(&2)?.owner_id.as_deref(), Some("A1111AA"));
    Ok(())
}
