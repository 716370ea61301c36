//! Participant enlistment and removal.

use std::sync::Arc;

use common::LraId;
use store::{LraStatus, Participant, RecordStore};
use uuid::Uuid;

use crate::error::{CoordinatorError, Result};
use crate::locks::LockMap;

/// Result of an enlistment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enlistment {
    /// The participant was added to the LRA.
    Accepted { recovery_id: Uuid },
    /// The endpoint was already enlisted; the existing leg is untouched.
    AlreadyEnlisted { recovery_id: Uuid },
}

impl Enlistment {
    /// The recovery identifier of the (new or existing) leg.
    pub fn recovery_id(&self) -> Uuid {
        match self {
            Enlistment::Accepted { recovery_id } | Enlistment::AlreadyEnlisted { recovery_id } => {
                *recovery_id
            }
        }
    }
}

/// Per-LRA participant list operations.
///
/// Obtained from [`crate::LraCoordinator::registry`]; shares the
/// coordinator's per-LRA locks so a join or leave can never interleave
/// with a close/cancel callback sequence on the same LRA.
pub struct ParticipantRegistry<S: RecordStore> {
    store: S,
    locks: Arc<LockMap>,
}

impl<S: RecordStore> ParticipantRegistry<S> {
    pub(crate) fn new(store: S, locks: Arc<LockMap>) -> Self {
        Self { store, locks }
    }

    /// Enlists a participant in an Active LRA.
    ///
    /// Join is idempotent per endpoint: re-enlisting an endpoint returns
    /// the existing leg without creating a duplicate.
    #[tracing::instrument(skip(self, participant), fields(endpoint = %participant.endpoint))]
    pub async fn enlist(&self, lra: LraId, participant: Participant) -> Result<Enlistment> {
        let lock = self.locks.lock_for(lra);
        let _guard = lock.lock().await;

        let mut record = self.store.get(lra).await?;
        if record.status != LraStatus::Active {
            return Err(CoordinatorError::EndAlreadyBegun { lra });
        }

        if let Some(existing) = record.participant(&participant.endpoint) {
            return Ok(Enlistment::AlreadyEnlisted {
                recovery_id: existing.recovery_id,
            });
        }

        let recovery_id = participant.recovery_id;
        record.enlist(participant);
        self.store.put(record).await?;
        tracing::info!(lra = %lra, "participant enlisted");
        Ok(Enlistment::Accepted { recovery_id })
    }

    /// Removes a participant from an Active LRA. Once close or cancel has
    /// begun the participant is committed and removal is refused.
    #[tracing::instrument(skip(self))]
    pub async fn leave(&self, lra: LraId, endpoint: &str) -> Result<()> {
        let lock = self.locks.lock_for(lra);
        let _guard = lock.lock().await;

        let mut record = self.store.get(lra).await?;
        if record.status != LraStatus::Active {
            return Err(CoordinatorError::EndAlreadyBegun { lra });
        }

        if !record.remove_participant(endpoint) {
            return Err(CoordinatorError::ParticipantNotFound {
                lra,
                endpoint: endpoint.to_string(),
            });
        }
        self.store.put(record).await?;
        tracing::info!(lra = %lra, endpoint, "participant left");
        Ok(())
    }

    /// Lists the LRA's participants in enlistment order.
    pub async fn list(&self, lra: LraId) -> Result<Vec<Participant>> {
        Ok(self.store.get(lra).await?.participants)
    }
}
