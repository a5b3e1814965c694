use std::time::Duration;

use crosswalk_core::hlc::physical_now;
use crosswalk_core::{Mapping, MappingType};
use crosswalk_engine::{EngineConfig, RetentionSweep, kinds};
use crosswalk_harness::TestEngine;
use crosswalk_storage::{Column, MappingKind};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Declares a retention age but is never created in any store.
static UNREGISTERED: MappingKind = MappingKind {
    table: "unregistered_sync_mapping",
    legacy: &[Column::integer("nomis_id", "nomisId")],
    new: &[Column::text("dps_id", "dpsId")],
    parent: None,
    owner: None,
    retention: Some(Duration::from_secs(60)),
};

fn profile(booking: i64, kind: &str) -> Mapping<(i64, String)> {
    Mapping::new(
        (booking, kind.to_string()),
        format!("p-{booking}-{kind}"),
        MappingType::updated("NOMIS"),
    )
}

#[test]
fn sweep_removes_only_expired_rows() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let profiles = t.profile_details()?;
    profiles.register_mapping(profile(1, "BUILD"))?;
    profiles.register_mapping(profile(1, "HAIR"))?;
    t.court_cases()?
        .register_mapping(Mapping::migrated(1, "case-1".to_string(), "run-1"))?;

    let sweep = t.engine.retention();
    assert_eq!(sweep.kinds().len(), 1);

    let now = physical_now()?;
    let fresh = sweep.run_once(now);
    assert_eq!(fresh.total_deleted(), 0);
    assert!(fresh.failures.is_empty());

    let later = sweep.run_once(now + 29 * DAY_MS);
    assert_eq!(later.deleted, vec![(kinds::PROFILE_DETAIL_SYNC.table, 2)]);
    assert!(profiles.find_by_legacy_id(&(1, "BUILD".to_string())).is_err());

    // Kinds without a retention age are never swept.
    assert!(t.court_cases()?.find_by_legacy_id(&1).is_ok());

    let stats = sweep.stats();
    assert_eq!(stats.ticks(), 2);
    assert_eq!(stats.failed_ticks(), 0);
    assert_eq!(stats.deleted_rows(), 2);
    Ok(())
}

#[test]
fn failing_kind_does_not_stop_the_rest() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    t.profile_details()?.register_mapping(profile(2, "BUILD"))?;

    let sweep = RetentionSweep::with_kinds(
        t.engine.store().clone(),
        vec![&UNREGISTERED, &kinds::PROFILE_DETAIL_SYNC],
    );
    let report = sweep.run_once(physical_now()? + 29 * DAY_MS);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, UNREGISTERED.table);
    assert_eq!(report.total_deleted(), 1);
    assert_eq!(sweep.stats().failed_ticks(), 1);
    Ok(())
}

#[tokio::test]
async fn spawned_sweep_keeps_ticking_through_failures() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let sweep = RetentionSweep::with_kinds(t.engine.store().clone(), vec![&UNREGISTERED]);
    let stats = sweep.stats();

    let handle = sweep.spawn(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    let failed = stats.failed_ticks();
    assert!(failed >= 2, "failed ticks: {failed}");
    assert!(stats.ticks() >= failed);
    assert_eq!(stats.deleted_rows(), 0);
    Ok(())
}

#[tokio::test]
async fn zero_period_is_raised_to_the_minimum() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestEngine::new()?;
    let sweep = RetentionSweep::with_kinds(t.engine.store().clone(), vec![&UNREGISTERED]);
    let stats = sweep.stats();

    let handle = sweep.spawn(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());
    handle.abort();

    assert!(stats.failed_ticks() >= 1);
    Ok(())
}

#[tokio::test]
async fn engine_starts_the_sweep_only_when_enabled() -> Result<(), Box<dyn std::error::Error>> {
    let disabled = TestEngine::with_config(EngineConfig {
        retention_enabled: false,
        ..EngineConfig::default()
    })?;
    assert!(disabled.engine.start_retention().is_none());

    let nothing_to_sweep = TestEngine::with_kinds(&[&kinds::COURT_CASES])?;
    assert!(nothing_to_sweep.engine.start_retention().is_none());

    let enabled = TestEngine::new()?;
    let handle = enabled.engine.start_retention();
    assert!(handle.is_some());
    if let Some(handle) = handle {
        handle.abort();
    }
    Ok(())
}
