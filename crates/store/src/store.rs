//! The record store contract.

use async_trait::async_trait;
use common::LraId;

use crate::error::Result;
use crate::record::LraRecord;

/// Keyed storage of LRA records.
///
/// Implementations must support concurrent readers with single-writer
/// semantics per record. Serialization of read-modify-write cycles on one
/// LRA is the coordinator's responsibility (it holds a per-LRA lock across
/// each transition); the store only guarantees that individual `put` and
/// `get` calls are atomic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts or replaces a record.
    async fn put(&self, record: LraRecord) -> Result<()>;

    /// Fetches a record by id, signalling `NotFound` for unknown or
    /// evicted ids.
    async fn get(&self, id: LraId) -> Result<LraRecord>;

    /// Lists records that have not reached a terminal status, in start
    /// order.
    async fn list_active(&self) -> Result<Vec<LraRecord>>;

    /// Lists all records, terminal but not-yet-evicted ones included, in
    /// start order.
    async fn list_all(&self) -> Result<Vec<LraRecord>>;

    /// Removes a record. Removing an absent record is a no-op.
    async fn delete(&self, id: LraId) -> Result<()>;
}
