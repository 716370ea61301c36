//! LRA record store: the coordinator's only shared mutable resource.
//!
//! Holds one [`LraRecord`] per saga, keyed by [`common::LraId`]. The store
//! itself carries no protocol logic; status transitions and participant
//! bookkeeping live in the coordinator crate.

pub mod error;
pub mod memory;
pub mod record;
pub mod status;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryRecordStore;
pub use record::{LraRecord, Participant};
pub use status::{Direction, LraStatus, ParticipantStatus};
pub use store::RecordStore;
