//! LRA coordinator: saga state machine, participant registry, nested
//! sagas and recovery.
//!
//! An LRA (Long Running Action) ends along one of two paths: close
//! delivers complete callbacks, cancel delivers compensate callbacks.
//! Callbacks go out in enlistment order, one at a time per LRA; a 202
//! response leaves the participant in doubt until a recovery scan retries
//! it. Nested LRAs enlist in their parent and receive their final
//! disposition when the parent ends.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod http_client;
mod locks;
mod nested;
pub mod recovery;
pub mod registry;

pub use client::{
    CallbackError, CallbackOutcome, InMemoryParticipantClient, ParticipantClient, Scripted,
};
pub use coordinator::LraCoordinator;
pub use error::CoordinatorError;
pub use http_client::HttpParticipantClient;
pub use recovery::{RecoveryScheduler, ScanReport};
pub use registry::{Enlistment, ParticipantRegistry};
