//! LRA and participant records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::LraId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{Direction, LraStatus, ParticipantStatus};

/// One enlisted leg of an LRA.
///
/// Callback endpoints are all optional; the coordinator dispatches by
/// presence of a URL, not by participant type. A nested child LRA enlists
/// in its parent with `nested_lra` set and no callback URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Enlistment endpoint, the uniqueness key within one LRA.
    pub endpoint: String,
    pub complete_url: Option<String>,
    pub compensate_url: Option<String>,
    pub status_url: Option<String>,
    pub forget_url: Option<String>,
    /// Notified with the final LRA status once the end phase settles.
    pub after_url: Option<String>,
    /// Opaque payload supplied at enlistment, echoed back on callbacks.
    pub user_data: Option<String>,
    pub status: ParticipantStatus,
    /// Number of 202-Accepted responses received for this participant.
    pub accepted_count: u32,
    /// Set when the last callback attempt needs a recovery retry.
    pub in_doubt: bool,
    /// Identifier used in the recovery header returned on enlistment.
    pub recovery_id: Uuid,
    /// Child LRA standing in as this participant, for nested enlistments.
    pub nested_lra: Option<LraId>,
}

impl Participant {
    /// Creates a participant with no callback URLs registered yet.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            complete_url: None,
            compensate_url: None,
            status_url: None,
            forget_url: None,
            after_url: None,
            user_data: None,
            status: ParticipantStatus::Active,
            accepted_count: 0,
            in_doubt: false,
            recovery_id: Uuid::new_v4(),
            nested_lra: None,
        }
    }

    /// Creates the synthetic participant that represents a nested child LRA
    /// inside its parent.
    pub fn nested(child: LraId) -> Self {
        let mut p = Self::new(format!("urn:lra:nested:{child}"));
        p.nested_lra = Some(child);
        p
    }

    /// Returns the callback URL for the given direction, if registered.
    pub fn callback_url(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Close => self.complete_url.as_deref(),
            Direction::Cancel => self.compensate_url.as_deref(),
        }
    }

    /// Returns true if this participant still needs work for the given
    /// direction: not yet successful and not already dispositioned the
    /// other way.
    pub fn needs_callback(&self, direction: Direction) -> bool {
        match direction {
            // Completion never overrides a compensation outcome.
            Direction::Close => matches!(
                self.status,
                ParticipantStatus::Active | ParticipantStatus::Completing
            ),
            // Compensation is the authoritative undo: it is still owed even
            // after a successful completion.
            Direction::Cancel => matches!(
                self.status,
                ParticipantStatus::Active
                    | ParticipantStatus::Completing
                    | ParticipantStatus::Completed
                    | ParticipantStatus::Compensating
            ),
        }
    }
}

/// The durable record of one LRA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LraRecord {
    pub id: LraId,
    /// Enclosing LRA, for nested sagas. The parent's lifecycle is not
    /// owned here; only the relationship is recorded.
    pub parent_id: Option<LraId>,
    /// Caller-supplied label, informational only.
    pub client_name: String,
    pub status: LraStatus,
    pub started_at: DateTime<Utc>,
    /// Absolute deadline; expiry of an Active LRA triggers cancellation.
    pub timeout_at: DateTime<Utc>,
    /// Set when the LRA reached a terminal status, for eviction retention.
    pub finished_at: Option<DateTime<Utc>>,
    /// Enlisted participants in enlistment order, unique by endpoint.
    pub participants: Vec<Participant>,
}

impl LraRecord {
    /// Creates an Active record with its deadline set to `now + timeout`.
    pub fn new(
        id: LraId,
        parent_id: Option<LraId>,
        client_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent_id,
            client_name: client_name.into(),
            status: LraStatus::Active,
            started_at: now,
            timeout_at: deadline(now, timeout),
            finished_at: None,
            participants: Vec::new(),
        }
    }

    /// Adds a participant, preserving enlistment order.
    ///
    /// Returns false without modifying anything when the endpoint is
    /// already enlisted (join is idempotent per endpoint).
    pub fn enlist(&mut self, participant: Participant) -> bool {
        if self
            .participants
            .iter()
            .any(|p| p.endpoint == participant.endpoint)
        {
            return false;
        }
        self.participants.push(participant);
        true
    }

    /// Removes a participant by endpoint. Returns false if it was not
    /// enlisted.
    pub fn remove_participant(&mut self, endpoint: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.endpoint != endpoint);
        self.participants.len() != before
    }

    /// Looks up a participant by enlistment endpoint.
    pub fn participant(&self, endpoint: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.endpoint == endpoint)
    }

    /// Looks up a participant by its recovery identifier.
    pub fn participant_by_recovery_id(&self, recovery_id: Uuid) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.recovery_id == recovery_id)
    }

    /// Returns true if the deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.timeout_at
    }

    /// Extends the deadline to `now + timeout`.
    pub fn extend_timeout(&mut self, timeout: Duration) {
        self.timeout_at = deadline(Utc::now(), timeout);
    }

    /// Records a terminal status and the time it was reached.
    pub fn finish(&mut self, status: LraStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if any participant awaits a recovery retry.
    pub fn has_in_doubt(&self) -> bool {
        self.participants.iter().any(|p| p.in_doubt)
    }

    /// Returns true if every participant succeeded for the direction.
    pub fn all_succeeded(&self, direction: Direction) -> bool {
        self.participants
            .iter()
            .all(|p| p.status.succeeded_for(direction))
    }

    /// Returns true if any participant permanently failed the last attempt
    /// for the direction.
    pub fn any_failed(&self, direction: Direction) -> bool {
        let failed = match direction {
            Direction::Close => ParticipantStatus::FailedToComplete,
            Direction::Cancel => ParticipantStatus::FailedToCompensate,
        };
        self.participants.iter().any(|p| p.status == failed)
    }
}

// Saturates instead of panicking on absurd TimeLimit values.
fn deadline(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
