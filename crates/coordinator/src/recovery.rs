//! Recovery scans: retrying in-doubt participants and evicting settled
//! records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::LraId;
use store::{Direction, LraRecord, LraStatus, RecordStore};
use tokio::task::JoinHandle;

use crate::client::ParticipantClient;
use crate::coordinator::LraCoordinator;
use crate::error::Result;

/// Terminal records are kept around this long before eviction, so an
/// idempotent repeat of close/cancel can still observe the outcome.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(120);

/// What one recovery scan did.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanReport {
    /// Expired Active LRAs cancelled by this scan.
    pub timed_out: usize,
    /// Participant callbacks retried or settled by status query.
    pub retried: usize,
    /// Terminal records evicted from the store.
    pub evicted: usize,
}

/// Periodic/on-demand retry pass over in-doubt participants.
///
/// Safe to run arbitrarily often: participants that already acknowledged
/// a terminal outcome are never re-invoked, and scans share the per-LRA
/// locks with close/cancel so they never interleave with one.
pub struct RecoveryScheduler<S, C>
where
    S: RecordStore + Clone,
    C: ParticipantClient,
{
    coordinator: Arc<LraCoordinator<S, C>>,
    retention: Duration,
}

impl<S, C> RecoveryScheduler<S, C>
where
    S: RecordStore + Clone,
    C: ParticipantClient,
{
    /// Creates a scheduler with the default eviction retention.
    pub fn new(coordinator: Arc<LraCoordinator<S, C>>) -> Self {
        Self {
            coordinator,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Overrides how long terminal records are retained before eviction.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Runs one full scan: fire due timeouts, retry in-doubt participants,
    /// evict settled records.
    #[tracing::instrument(skip(self))]
    pub async fn run_recovery_scan(&self) -> Result<ScanReport> {
        metrics::counter!("recovery_scans_total").increment(1);

        let timed_out = self.coordinator.check_timeouts().await?;

        let mut retried = 0;
        // newest first, so a nested child settles before its parent's leg
        // is re-examined in the same scan
        for record in self.coordinator.store.list_all().await?.into_iter().rev() {
            if record.status.is_ending() && record.has_in_doubt() {
                retried += self.recover_one(record.id).await?;
            }
        }

        let evicted = self.evict_settled().await?;
        tracing::debug!(timed_out, retried, evicted, "recovery scan finished");
        Ok(ScanReport {
            timed_out,
            retried,
            evicted,
        })
    }

    /// Spawns a task running a scan every `interval`.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if let Err(err) = self.run_recovery_scan().await {
                    tracing::error!(error = %err, "recovery scan failed");
                }
            }
        })
    }

    async fn recover_one(&self, id: LraId) -> Result<usize> {
        let coordinator = &self.coordinator;
        let lock = coordinator.locks.lock_for(id);
        let _guard = lock.lock().await;

        let Ok(mut record) = coordinator.store.get(id).await else {
            return Ok(0);
        };
        if record.status.is_terminal() {
            return Ok(0);
        }
        let Some(direction) = record.status.direction() else {
            return Ok(0);
        };

        let mut retried = 0;
        for idx in 0..record.participants.len() {
            if !record.participants[idx].in_doubt {
                continue;
            }
            tracing::info!(lra = %id, endpoint = %record.participants[idx].endpoint, "retrying in-doubt participant");
            if record.participants[idx].nested_lra.is_some() {
                coordinator.resolve_nested(&mut record, idx, direction).await?;
            } else if !self.settle_by_status_query(&mut record, idx, direction).await {
                coordinator.attempt_callback(&mut record, idx, direction).await?;
            }
            retried += 1;
            coordinator.store.put(record.clone()).await?;
        }

        coordinator.finalize(&mut record, direction).await?;
        Ok(retried)
    }

    /// Asks the participant for its own status before re-invoking the
    /// callback. A participant that reports success is settled without
    /// another invocation and told to forget the work.
    async fn settle_by_status_query(
        &self,
        record: &mut LraRecord,
        idx: usize,
        direction: Direction,
    ) -> bool {
        let lra = record.id;
        let Some(status_url) = record.participants[idx].status_url.clone() else {
            return false;
        };
        let Ok(reported) = self.coordinator.client.status(&status_url, lra).await else {
            return false;
        };
        if !reported.succeeded_for(direction) {
            return false;
        }

        let forget_url = record.participants[idx].forget_url.clone();
        let p = &mut record.participants[idx];
        p.status = reported;
        p.in_doubt = false;

        if let Some(url) = forget_url {
            if let Err(err) = self.coordinator.client.forget(&url, lra).await {
                tracing::warn!(lra = %lra, error = %err, "forget failed; participant keeps its record");
            }
        }
        true
    }

    /// Removes cleanly-terminal records past the retention window. Failed
    /// LRAs are kept for operator inspection; a child is held until its
    /// parent finishes.
    async fn evict_settled(&self) -> Result<usize> {
        let now = Utc::now();
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let mut evicted = 0;

        for record in self.coordinator.store.list_all().await? {
            if !matches!(record.status, LraStatus::Closed | LraStatus::Cancelled) {
                continue;
            }
            if record.has_in_doubt() {
                continue;
            }
            let Some(finished_at) = record.finished_at else {
                continue;
            };
            if now.signed_duration_since(finished_at) < retention {
                continue;
            }
            if let Some(parent) = record.parent_id
                && let Ok(parent_record) = self.coordinator.store.get(parent).await
                && !parent_record.status.is_terminal()
            {
                continue;
            }

            self.coordinator.store.delete(record.id).await?;
            self.coordinator.locks.remove(record.id);
            tracing::debug!(lra = %record.id, "record evicted");
            evicted += 1;
        }
        Ok(evicted)
    }
}
