use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crosswalk_core::Hlc;
use crosswalk_core::hlc::physical_now;
use crosswalk_storage::{MappingKind, SqliteStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// Shortest period `spawn` will tick at; smaller values are raised to it.
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

/// Counters shared between a running sweep and whoever spawned it.
#[derive(Debug, Default)]
pub struct SweepStats {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    deleted_rows: AtomicU64,
}

impl SweepStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks.load(Ordering::Relaxed)
    }

    pub fn deleted_rows(&self) -> u64 {
        self.deleted_rows.load(Ordering::Relaxed)
    }

    fn record(&self, deleted: u64, failed: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.deleted_rows.fetch_add(deleted, Ordering::Relaxed);
        if failed {
            self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Default)]
pub struct SweepReport {
    /// Rows removed per table; tables with nothing expired are left out.
    pub deleted: Vec<(&'static str, u64)>,
    pub failures: Vec<(&'static str, String)>,
}

impl SweepReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

/// Removes rows older than their kind's retention age.
#[derive(Clone)]
pub struct RetentionSweep {
    store: SqliteStore,
    kinds: Vec<&'static MappingKind>,
    stats: Arc<SweepStats>,
}

impl RetentionSweep {
    /// Sweeps every registered kind that declares a retention age.
    pub fn new(store: SqliteStore) -> Self {
        let kinds = store
            .kinds()
            .iter()
            .copied()
            .filter(|k| k.retention.is_some())
            .collect();
        Self::with_kinds(store, kinds)
    }

    pub fn with_kinds(store: SqliteStore, kinds: Vec<&'static MappingKind>) -> Self {
        Self {
            store,
            kinds,
            stats: Arc::new(SweepStats::default()),
        }
    }

    pub fn kinds(&self) -> &[&'static MappingKind] {
        &self.kinds
    }

    pub fn stats(&self) -> Arc<SweepStats> {
        Arc::clone(&self.stats)
    }

    /// One pass at wall time `now_ms`. A failing kind is logged and
    /// reported; the remaining kinds still run.
    pub fn run_once(&self, now_ms: u64) -> SweepReport {
        let mut report = SweepReport::default();
        for kind in self.kinds.iter().copied() {
            let Some(max_age) = kind.retention else {
                continue;
            };
            let age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
            let cutoff = Hlc::new(now_ms.saturating_sub(age_ms), 0);
            match self.store.delete_created_before(kind, cutoff) {
                Ok(0) => {}
                Ok(n) => {
                    info!(table = kind.table, deleted = n, "expired mappings removed");
                    report.deleted.push((kind.table, n));
                }
                Err(e) => {
                    warn!(table = kind.table, error = %e, "retention sweep failed");
                    report.failures.push((kind.table, e.to_string()));
                }
            }
        }
        self.stats
            .record(report.total_deleted(), !report.failures.is_empty());
        report
    }

    /// One pass at the current wall time.
    pub fn tick(&self) -> Result<SweepReport, EngineError> {
        let now = physical_now()?;
        Ok(self.run_once(now))
    }

    /// Runs a pass every `period` until the handle is aborted. Failed passes
    /// are logged and counted; the loop keeps going.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let sweep = self.clone();
                match tokio::task::spawn_blocking(move || sweep.tick()).await {
                    Ok(Ok(report)) => {
                        debug!(deleted = report.total_deleted(), "retention tick done");
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "retention tick failed");
                        self.stats.record(0, true);
                    }
                    Err(e) => {
                        warn!(error = %e, "retention tick panicked");
                        self.stats.record(0, true);
                    }
                }
            }
        })
    }
}
