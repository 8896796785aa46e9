//! Background warming of the leading pages.
//!
//! A sweep walks `0, limit, 2·limit, …` one offset at a time so the store
//! never sees more than one outstanding request from it. At most one sweep
//! task exists; triggers that arrive while it runs are folded into a single
//! trailing pass on the same task.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::PageCache;
use crate::Error;

#[derive(Debug, Default)]
pub(super) struct SweepPhase {
    running: bool,
    rerun: bool,
}

/// What one sweep pass did with each offset it visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Offsets fetched and installed.
    pub warmed: Vec<u64>,
    /// Offsets that were already fresh.
    pub skipped: Vec<u64>,
    /// Offsets whose fetch failed or was discarded by a clear, with the reason.
    pub failed: Vec<(u64, String)>,
}

impl SweepReport {
    pub fn visited(&self) -> usize {
        self.warmed.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl PageCache {
    /// Offsets covered by a sweep.
    pub fn sweep_offsets(&self) -> impl Iterator<Item = u64> + use<> {
        let limit = u64::from(self.config().page_limit);
        (0..u64::from(self.config().prefetch_pages)).map(move |i| i * limit)
    }

    pub async fn sweep_running(&self) -> bool {
        self.sweep.lock().await.running
    }

    /// Start a sweep unless one is already running.
    ///
    /// Returns the task handle, which resolves to the report of the last pass.
    /// Returns `None` if a sweep was already running; that sweep will make
    /// one more pass after its current one.
    pub async fn trigger_sweep(self: &Arc<Self>) -> Option<JoinHandle<SweepReport>> {
        {
            let mut phase = self.sweep.lock().await;
            if phase.running {
                phase.rerun = true;
                tracing::debug!("prefetch sweep already running; queued a trailing pass");
                return None;
            }
            phase.running = true;
            phase.rerun = false;
        }

        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut pass = 1u32;
            loop {
                let report = cache.sweep_pass().await;
                tracing::info!(
                    pass,
                    warmed = report.warmed.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "prefetch sweep pass finished"
                );

                let mut phase = cache.sweep.lock().await;
                if phase.rerun {
                    phase.rerun = false;
                    pass += 1;
                    continue;
                }
                phase.running = false;
                return report;
            }
        }))
    }

    async fn sweep_pass(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for offset in self.sweep_offsets() {
            if self.is_valid(offset).await {
                report.skipped.push(offset);
                continue;
            }

            match self.fetch_and_install(offset).await {
                Ok((_, true)) => report.warmed.push(offset),
                Ok((_, false)) => report.failed.push((offset, "discarded: cache cleared during fetch".to_string())),
                Err(e) => {
                    let err = Error::Prefetch { offset, reason: e.to_string() };
                    tracing::warn!(error = %err, "prefetch sweep step failed");
                    report.failed.push((offset, e.to_string()));
                }
            }
        }

        report
    }
}
