//! The saga state machine driving LRAs through close and cancel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::LraId;
use store::{Direction, LraRecord, LraStatus, Participant, RecordStore};

use crate::client::{CallbackError, CallbackOutcome, ParticipantClient};
use crate::error::{CoordinatorError, Result};
use crate::locks::LockMap;
use crate::registry::ParticipantRegistry;

/// Default deadline for LRAs started without an explicit time limit.
pub const DEFAULT_LRA_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates LRAs and their participants.
///
/// One instance serves every LRA; per-LRA transition locks serialize
/// close/cancel/recovery on a single saga while different sagas progress
/// concurrently. Participant callbacks are issued without holding any
/// store lock, one participant at a time in enlistment order.
pub struct LraCoordinator<S, C>
where
    S: RecordStore,
    C: ParticipantClient,
{
    pub(crate) store: S,
    pub(crate) client: C,
    pub(crate) locks: Arc<LockMap>,
    default_timeout: Duration,
}

impl<S, C> LraCoordinator<S, C>
where
    S: RecordStore + Clone,
    C: ParticipantClient,
{
    /// Creates a coordinator over the given store and callback client.
    pub fn new(store: S, client: C) -> Self {
        Self {
            store,
            client,
            locks: Arc::new(LockMap::default()),
            default_timeout: DEFAULT_LRA_TIMEOUT,
        }
    }

    /// Overrides the default time limit applied when `start` gets none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns a participant registry sharing this coordinator's per-LRA
    /// locks, so join/leave cannot race an in-flight transition.
    pub fn registry(&self) -> ParticipantRegistry<S> {
        ParticipantRegistry::new(self.store.clone(), self.locks.clone())
    }

    /// Starts a new LRA, optionally nested under `parent_id`.
    ///
    /// A nested LRA is also enlisted as a participant of its parent, so
    /// the parent's own close or cancel determines the child's final
    /// disposition. No participant is contacted here.
    #[tracing::instrument(skip(self))]
    pub async fn start(
        &self,
        parent_id: Option<LraId>,
        client_name: &str,
        timeout: Option<Duration>,
    ) -> Result<LraId> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let id = LraId::new();

        match parent_id {
            None => {
                let record = LraRecord::new(id, None, client_name, timeout);
                self.store.put(record).await?;
            }
            Some(parent) => {
                let lock = self.locks.lock_for(parent);
                let _guard = lock.lock().await;

                let mut parent_record = self.store.get(parent).await?;
                if parent_record.status != LraStatus::Active {
                    return Err(CoordinatorError::InvalidState {
                        lra: parent,
                        op: "nest under",
                        status: parent_record.status,
                    });
                }

                let record = LraRecord::new(id, Some(parent), client_name, timeout);
                self.store.put(record).await?;
                parent_record.enlist(Participant::nested(id));
                self.store.put(parent_record).await?;
            }
        }

        metrics::counter!("lra_started_total").increment(1);
        tracing::info!(lra = %id, parent = ?parent_id, client = client_name, "LRA started");
        Ok(id)
    }

    /// Returns the current status of one LRA.
    pub async fn status(&self, id: LraId) -> Result<LraStatus> {
        Ok(self.store.get(id).await?.status)
    }

    /// Returns true if the LRA exists and has not begun to end.
    pub async fn is_active(&self, id: LraId) -> Result<bool> {
        Ok(self.status(id).await? == LraStatus::Active)
    }

    /// Returns true if the LRA closed cleanly.
    pub async fn is_completed(&self, id: LraId) -> Result<bool> {
        Ok(self.status(id).await? == LraStatus::Closed)
    }

    /// Returns true if the LRA cancelled cleanly.
    pub async fn is_compensated(&self, id: LraId) -> Result<bool> {
        Ok(self.status(id).await? == LraStatus::Cancelled)
    }

    /// Extends the LRA's deadline to `now + timeout`. Valid only while
    /// Active.
    #[tracing::instrument(skip(self))]
    pub async fn renew_timeout(&self, id: LraId, timeout: Duration) -> Result<()> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let mut record = self.store.get(id).await?;
        if record.status != LraStatus::Active {
            return Err(CoordinatorError::InvalidState {
                lra: id,
                op: "renew",
                status: record.status,
            });
        }
        record.extend_timeout(timeout);
        self.store.put(record).await?;
        Ok(())
    }

    /// Closes the LRA: runs each participant's complete callback in
    /// enlistment order and returns the resulting status.
    ///
    /// Closing an ended LRA is a no-op returning the recorded status. The
    /// returned status may be non-terminal (Closing) when a participant is
    /// in doubt; callers poll `status` while recovery finishes the job.
    pub async fn close(&self, id: LraId) -> Result<LraStatus> {
        self.end(id, Direction::Close).await
    }

    /// Cancels the LRA: runs each participant's compensate callback in
    /// enlistment order and returns the resulting status.
    ///
    /// Compensation is the authoritative undo: participants whose complete
    /// callback already ran still receive it.
    pub async fn cancel(&self, id: LraId) -> Result<LraStatus> {
        self.end(id, Direction::Cancel).await
    }

    /// Cancels every Active LRA whose deadline has passed. Timeout implies
    /// compensate, never complete. Returns the number of cancellations
    /// triggered.
    pub async fn check_timeouts(&self) -> Result<usize> {
        let now = Utc::now();
        let mut fired = 0;
        for record in self.store.list_active().await? {
            if record.status == LraStatus::Active && record.is_expired(now) {
                tracing::info!(lra = %record.id, "deadline passed, cancelling");
                metrics::counter!("lra_timed_out_total").increment(1);
                // cancel re-checks under the per-LRA lock; a transition
                // already in flight wins and this becomes a no-op
                match self.cancel(record.id).await {
                    Ok(_) => fired += 1,
                    Err(CoordinatorError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(fired)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn end(&self, id: LraId, direction: Direction) -> Result<LraStatus> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let mut record = self.store.get(id).await?;

        if record.status.is_terminal() {
            if direction == Direction::Cancel && self.can_reopen(&record).await {
                tracing::info!(lra = %id, "re-opening provisionally closed nested LRA for cancellation");
                record.status = LraStatus::Cancelling;
                record.finished_at = None;
                self.store.put(record.clone()).await?;
            } else {
                return Ok(record.status);
            }
        } else if record.status.is_ending() {
            if record.status.direction() == Some(direction) || direction == Direction::Close {
                // repeat of an end already under way; recovery owns the
                // outstanding in-doubt participants
                return Ok(record.status);
            }
            // cancel overrides a close stuck awaiting recovery
            record.status = LraStatus::Cancelling;
            self.store.put(record.clone()).await?;
        } else {
            record.status = direction.in_progress();
            self.store.put(record.clone()).await?;
        }

        self.drive(&mut record, direction).await?;
        self.finalize(&mut record, direction).await?;
        Ok(record.status)
    }

    /// A Closed child of an unfinished parent may still be re-opened for
    /// compensation; its completion was only provisional.
    async fn can_reopen(&self, record: &LraRecord) -> bool {
        if record.status != LraStatus::Closed {
            return false;
        }
        let Some(parent) = record.parent_id else {
            return false;
        };
        match self.store.get(parent).await {
            Ok(parent_record) => {
                !parent_record.status.is_terminal()
                    || parent_record.status.direction() == Some(Direction::Cancel)
            }
            Err(_) => false,
        }
    }

    /// Invokes the outstanding callback of every participant that still
    /// needs one, in enlistment order, persisting after each step.
    pub(crate) async fn drive(&self, record: &mut LraRecord, direction: Direction) -> Result<()> {
        for idx in 0..record.participants.len() {
            if !record.participants[idx].needs_callback(direction) {
                continue;
            }
            if record.participants[idx].nested_lra.is_some() {
                self.resolve_nested(record, idx, direction).await?;
            } else {
                self.attempt_callback(record, idx, direction).await?;
            }
            self.store.put(record.clone()).await?;
        }
        Ok(())
    }

    /// One callback attempt against one participant.
    ///
    /// The record is persisted in its in-progress state before the network
    /// call goes out, and only local state is updated afterwards; no store
    /// lock spans the round trip.
    pub(crate) async fn attempt_callback(
        &self,
        record: &mut LraRecord,
        idx: usize,
        direction: Direction,
    ) -> Result<()> {
        let lra = record.id;
        let (url, user_data) = {
            let p = &mut record.participants[idx];
            p.status = direction.participant_in_progress();
            match p.callback_url(direction) {
                // no endpoint registered for this direction: vacuously done
                None => {
                    p.status = direction.participant_succeeded();
                    p.in_doubt = false;
                    return Ok(());
                }
                Some(url) => (url.to_string(), p.user_data.clone()),
            }
        };
        self.store.put(record.clone()).await?;

        let result = match direction {
            Direction::Close => self.client.complete(&url, lra, user_data.as_deref()).await,
            Direction::Cancel => self.client.compensate(&url, lra, user_data.as_deref()).await,
        };
        metrics::counter!("participant_callbacks_total").increment(1);

        let p = &mut record.participants[idx];
        match result {
            Ok(CallbackOutcome::Done) | Ok(CallbackOutcome::Gone) => {
                p.status = direction.participant_succeeded();
                p.in_doubt = false;
            }
            Ok(CallbackOutcome::Accepted) => {
                p.accepted_count += 1;
                p.in_doubt = true;
                tracing::debug!(lra = %lra, endpoint = %p.endpoint, "participant accepted, awaiting recovery");
            }
            // a dropped connection may mean the request never arrived;
            // leave the participant in doubt for recovery to retry
            Err(CallbackError::Transport(reason)) => {
                p.in_doubt = true;
                tracing::warn!(lra = %lra, endpoint = %p.endpoint, %reason, "participant unreachable");
            }
            // error statuses and timeouts are permanent for this LRA
            Err(err) => {
                p.status = direction.participant_failed();
                p.in_doubt = false;
                tracing::warn!(lra = %lra, endpoint = %p.endpoint, error = %err, "participant callback failed");
            }
        }
        Ok(())
    }

    /// Settles the LRA status after a callback pass.
    pub(crate) async fn finalize(
        &self,
        record: &mut LraRecord,
        direction: Direction,
    ) -> Result<()> {
        let target = if record.any_failed(direction) {
            direction.failed()
        } else if record.all_succeeded(direction) {
            direction.succeeded()
        } else {
            // in-doubt participants remain; recovery will finish the job
            direction.in_progress()
        };

        let ended = record.status != target && target.is_terminal();
        if record.status != target {
            if target.is_terminal() {
                record.finish(target);
                match target {
                    LraStatus::Closed => metrics::counter!("lra_closed_total").increment(1),
                    LraStatus::Cancelled => metrics::counter!("lra_cancelled_total").increment(1),
                    _ => metrics::counter!("lra_failed_total").increment(1),
                }
                tracing::info!(lra = %record.id, status = %target, "LRA ended");
            } else {
                record.status = target;
            }
        }
        self.store.put(record.clone()).await?;

        if ended {
            self.notify_after(record, target).await;
        }
        Ok(())
    }

    /// Delivers the afterLRA notification to every participant that
    /// registered one. Best effort: a failure is logged and does not
    /// change the recorded outcome.
    async fn notify_after(&self, record: &LraRecord, final_status: LraStatus) {
        for p in &record.participants {
            let Some(url) = p.after_url.as_deref() else {
                continue;
            };
            if let Err(err) = self.client.after_lra(url, record.id, final_status).await {
                tracing::warn!(lra = %record.id, endpoint = %p.endpoint, error = %err, "afterLRA notification failed");
            }
        }
    }
}
