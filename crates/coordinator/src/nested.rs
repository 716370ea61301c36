//! Nested LRA disposition.
//!
//! A child LRA stands in its parent's participant list as a synthetic
//! participant. When the parent ends, the leg is settled by consulting
//! (and if necessary ending) the child, instead of invoking a callback
//! URL. Each real participant of the child receives at most one
//! completion and at most one compensation, whatever order parent and
//! child end in.

use store::{Direction, LraRecord, LraStatus, ParticipantStatus, RecordStore};

use crate::client::ParticipantClient;
use crate::coordinator::LraCoordinator;
use crate::error::Result;

impl<S, C> LraCoordinator<S, C>
where
    S: RecordStore + Clone,
    C: ParticipantClient,
{
    /// Settles the nested participant at `idx` for the given direction.
    pub(crate) async fn resolve_nested(
        &self,
        record: &mut LraRecord,
        idx: usize,
        direction: Direction,
    ) -> Result<()> {
        let Some(child) = record.participants[idx].nested_lra else {
            return Ok(());
        };

        let child_status = match self.store.get(child).await {
            Ok(child_record) => child_record.status,
            // already settled and evicted; nothing left to deliver
            Err(_) => {
                let p = &mut record.participants[idx];
                p.status = direction.participant_succeeded();
                p.in_doubt = false;
                return Ok(());
            }
        };

        let settled = match direction {
            // A child that reached any terminal outcome on its own reports
            // that outcome; its participants are not contacted again.
            Direction::Close => child_status.is_terminal(),
            // A child that already compensated must not be compensated
            // twice; anything else (Closed included) still owes its
            // participants the undo.
            Direction::Cancel => matches!(
                child_status,
                LraStatus::Cancelled | LraStatus::FailedToCancel
            ),
        };

        let outcome = if settled {
            child_status
        } else {
            tracing::debug!(parent = %record.id, child = %child, ?direction, "ending nested LRA");
            Box::pin(self.end(child, direction)).await?
        };

        let p = &mut record.participants[idx];
        (p.status, p.in_doubt) = child_outcome_to_leg(outcome, direction);
        Ok(())
    }
}

/// Maps the child LRA's status onto its leg in the parent.
fn child_outcome_to_leg(outcome: LraStatus, direction: Direction) -> (ParticipantStatus, bool) {
    match (direction, outcome) {
        (Direction::Close, LraStatus::Closing) => (ParticipantStatus::Completing, true),
        (Direction::Close, LraStatus::FailedToClose) => (ParticipantStatus::FailedToComplete, false),
        // a settled child (its own close, or an earlier independent cancel)
        // counts as a done leg on the parent's close path
        (Direction::Close, _) => (ParticipantStatus::Completed, false),
        (Direction::Cancel, LraStatus::Cancelling) => (ParticipantStatus::Compensating, true),
        (Direction::Cancel, LraStatus::FailedToCancel) => {
            (ParticipantStatus::FailedToCompensate, false)
        }
        (Direction::Cancel, _) => (ParticipantStatus::Compensated, false),
    }
}
