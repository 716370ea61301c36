//! LRA and participant status machines.

use serde::{Deserialize, Serialize};

/// The state of an LRA in its lifecycle.
///
/// State transitions:
/// ```text
/// Active ──► Closing ────┬──► Closed
///                        └──► FailedToClose
/// Active ──► Cancelling ─┬──► Cancelled
///                        └──► FailedToCancel
/// ```
///
/// Terminal states admit no further transitions, with one protocol
/// exception handled by the coordinator: a Closed nested LRA whose parent
/// has not finished may still be re-opened for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LraStatus {
    /// The LRA is accepting participants and has not begun to end.
    #[default]
    Active,

    /// Completion callbacks are being delivered or awaiting recovery.
    Closing,

    /// All participants completed (terminal state).
    Closed,

    /// Compensation callbacks are being delivered or awaiting recovery.
    Cancelling,

    /// All participants compensated (terminal state).
    Cancelled,

    /// At least one participant permanently failed to complete (terminal state).
    FailedToClose,

    /// At least one participant permanently failed to compensate (terminal state).
    FailedToCancel,
}

impl LraStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LraStatus::Closed
                | LraStatus::Cancelled
                | LraStatus::FailedToClose
                | LraStatus::FailedToCancel
        )
    }

    /// Returns true if a close or cancel is in progress.
    pub fn is_ending(&self) -> bool {
        matches!(self, LraStatus::Closing | LraStatus::Cancelling)
    }

    /// Returns the end direction this status belongs to, if any.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            LraStatus::Active => None,
            LraStatus::Closing | LraStatus::Closed | LraStatus::FailedToClose => {
                Some(Direction::Close)
            }
            LraStatus::Cancelling | LraStatus::Cancelled | LraStatus::FailedToCancel => {
                Some(Direction::Cancel)
            }
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LraStatus::Active => "Active",
            LraStatus::Closing => "Closing",
            LraStatus::Closed => "Closed",
            LraStatus::Cancelling => "Cancelling",
            LraStatus::Cancelled => "Cancelled",
            LraStatus::FailedToClose => "FailedToClose",
            LraStatus::FailedToCancel => "FailedToCancel",
        }
    }
}

impl std::fmt::Display for LraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LraStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(LraStatus::Active),
            "Closing" => Ok(LraStatus::Closing),
            "Closed" => Ok(LraStatus::Closed),
            "Cancelling" => Ok(LraStatus::Cancelling),
            "Cancelled" => Ok(LraStatus::Cancelled),
            "FailedToClose" => Ok(LraStatus::FailedToClose),
            "FailedToCancel" => Ok(LraStatus::FailedToCancel),
            other => Err(format!("unknown LRA status: {other}")),
        }
    }
}

/// The direction an LRA is ending in.
///
/// Close delivers complete callbacks, Cancel delivers compensate callbacks.
/// The symmetric halves of the state machine are driven through this enum
/// rather than duplicated per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Close,
    Cancel,
}

impl Direction {
    /// LRA status while callbacks for this direction are in flight.
    pub fn in_progress(&self) -> LraStatus {
        match self {
            Direction::Close => LraStatus::Closing,
            Direction::Cancel => LraStatus::Cancelling,
        }
    }

    /// LRA status once every participant succeeded.
    pub fn succeeded(&self) -> LraStatus {
        match self {
            Direction::Close => LraStatus::Closed,
            Direction::Cancel => LraStatus::Cancelled,
        }
    }

    /// LRA status once any participant permanently failed.
    pub fn failed(&self) -> LraStatus {
        match self {
            Direction::Close => LraStatus::FailedToClose,
            Direction::Cancel => LraStatus::FailedToCancel,
        }
    }

    /// Participant status while its callback for this direction is pending.
    pub fn participant_in_progress(&self) -> ParticipantStatus {
        match self {
            Direction::Close => ParticipantStatus::Completing,
            Direction::Cancel => ParticipantStatus::Compensating,
        }
    }

    /// Participant status after an acknowledged callback.
    pub fn participant_succeeded(&self) -> ParticipantStatus {
        match self {
            Direction::Close => ParticipantStatus::Completed,
            Direction::Cancel => ParticipantStatus::Compensated,
        }
    }

    /// Participant status after a permanently failed callback.
    pub fn participant_failed(&self) -> ParticipantStatus {
        match self {
            Direction::Close => ParticipantStatus::FailedToComplete,
            Direction::Cancel => ParticipantStatus::FailedToCompensate,
        }
    }
}

/// The state of a single participant within one LRA.
///
/// ```text
/// Active ──► Completing ──┬──► Completed
///                         └──► FailedToComplete
/// Active ──► Compensating ─┬──► Compensated
///                          └──► FailedToCompensate
/// ```
///
/// A 202 response leaves the participant in Completing/Compensating with
/// the in-doubt flag set; recovery scans advance it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ParticipantStatus {
    /// Enlisted, no finalization callback attempted yet.
    #[default]
    Active,

    /// Complete callback in flight or awaiting recovery.
    Completing,

    /// Complete callback acknowledged.
    Completed,

    /// Complete callback permanently failed for the last attempt.
    FailedToComplete,

    /// Compensate callback in flight or awaiting recovery.
    Compensating,

    /// Compensate callback acknowledged.
    Compensated,

    /// Compensate callback permanently failed for the last attempt.
    FailedToCompensate,
}

impl ParticipantStatus {
    /// Returns true if a callback reached a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParticipantStatus::Completed
                | ParticipantStatus::FailedToComplete
                | ParticipantStatus::Compensated
                | ParticipantStatus::FailedToCompensate
        )
    }

    /// Returns true if the participant succeeded for the given direction.
    pub fn succeeded_for(&self, direction: Direction) -> bool {
        match direction {
            Direction::Close => matches!(self, ParticipantStatus::Completed),
            Direction::Cancel => matches!(self, ParticipantStatus::Compensated),
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Active => "Active",
            ParticipantStatus::Completing => "Completing",
            ParticipantStatus::Completed => "Completed",
            ParticipantStatus::FailedToComplete => "FailedToComplete",
            ParticipantStatus::Compensating => "Compensating",
            ParticipantStatus::Compensated => "Compensated",
            ParticipantStatus::FailedToCompensate => "FailedToCompensate",
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(ParticipantStatus::Active),
            "Completing" => Ok(ParticipantStatus::Completing),
            "Completed" => Ok(ParticipantStatus::Completed),
            "FailedToComplete" => Ok(ParticipantStatus::FailedToComplete),
            "Compensating" => Ok(ParticipantStatus::Compensating),
            "Compensated" => Ok(ParticipantStatus::Compensated),
            "FailedToCompensate" => Ok(ParticipantStatus::FailedToCompensate),
            other => Err(format!("unknown participant status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_active() {
        assert_eq!(LraStatus::default(), LraStatus::Active);
        assert_eq!(ParticipantStatus::default(), ParticipantStatus::Active);
    }

    #[test]
    fn test_terminal_lra_states() {
        assert!(!LraStatus::Active.is_terminal());
        assert!(!LraStatus::Closing.is_terminal());
        assert!(!LraStatus::Cancelling.is_terminal());
        assert!(LraStatus::Closed.is_terminal());
        assert!(LraStatus::Cancelled.is_terminal());
        assert!(LraStatus::FailedToClose.is_terminal());
        assert!(LraStatus::FailedToCancel.is_terminal());
    }

    #[test]
    fn test_is_ending() {
        assert!(LraStatus::Closing.is_ending());
        assert!(LraStatus::Cancelling.is_ending());
        assert!(!LraStatus::Active.is_ending());
        assert!(!LraStatus::Closed.is_ending());
    }

    #[test]
    fn test_direction_of_status() {
        assert_eq!(LraStatus::Active.direction(), None);
        assert_eq!(LraStatus::Closing.direction(), Some(Direction::Close));
        assert_eq!(LraStatus::FailedToClose.direction(), Some(Direction::Close));
        assert_eq!(LraStatus::Cancelled.direction(), Some(Direction::Cancel));
    }

    #[test]
    fn test_direction_statuses() {
        assert_eq!(Direction::Close.in_progress(), LraStatus::Closing);
        assert_eq!(Direction::Close.succeeded(), LraStatus::Closed);
        assert_eq!(Direction::Close.failed(), LraStatus::FailedToClose);
        assert_eq!(Direction::Cancel.in_progress(), LraStatus::Cancelling);
        assert_eq!(Direction::Cancel.succeeded(), LraStatus::Cancelled);
        assert_eq!(Direction::Cancel.failed(), LraStatus::FailedToCancel);
        assert_eq!(
            Direction::Close.participant_succeeded(),
            ParticipantStatus::Completed
        );
        assert_eq!(
            Direction::Cancel.participant_in_progress(),
            ParticipantStatus::Compensating
        );
        assert_eq!(
            Direction::Cancel.participant_failed(),
            ParticipantStatus::FailedToCompensate
        );
    }

    #[test]
    fn test_participant_terminal_states() {
        assert!(!ParticipantStatus::Active.is_terminal());
        assert!(!ParticipantStatus::Completing.is_terminal());
        assert!(!ParticipantStatus::Compensating.is_terminal());
        assert!(ParticipantStatus::Completed.is_terminal());
        assert!(ParticipantStatus::FailedToComplete.is_terminal());
        assert!(ParticipantStatus::Compensated.is_terminal());
        assert!(ParticipantStatus::FailedToCompensate.is_terminal());
    }

    #[test]
    fn test_succeeded_for_direction() {
        assert!(ParticipantStatus::Completed.succeeded_for(Direction::Close));
        assert!(!ParticipantStatus::Completed.succeeded_for(Direction::Cancel));
        assert!(ParticipantStatus::Compensated.succeeded_for(Direction::Cancel));
        assert!(!ParticipantStatus::FailedToComplete.succeeded_for(Direction::Close));
    }

    #[test]
    fn test_display() {
        assert_eq!(LraStatus::FailedToClose.to_string(), "FailedToClose");
        assert_eq!(ParticipantStatus::Compensating.to_string(), "Compensating");
    }

    #[test]
    fn test_from_str_roundtrip() {
        for status in [
            LraStatus::Active,
            LraStatus::Closing,
            LraStatus::Closed,
            LraStatus::Cancelling,
            LraStatus::Cancelled,
            LraStatus::FailedToClose,
            LraStatus::FailedToCancel,
        ] {
            assert_eq!(status.as_str().parse::<LraStatus>(), Ok(status));
        }
        assert!("bogus".parse::<LraStatus>().is_err());
        assert_eq!(
            "Compensated".parse::<ParticipantStatus>(),
            Ok(ParticipantStatus::Compensated)
        );
    }

    #[test]
    fn test_serialization() {
        let status = LraStatus::Cancelling;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: LraStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
