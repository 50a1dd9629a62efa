//! Storage abstraction for Permit Import.
//!
//! The [`PermitStore`] trait defines every storage operation the import
//! pipeline and the search command need, enabling pluggable backends
//! (SQLite in the `permit-import` crate, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DedupKey, PermitHit, PermitRecord, StoredPermit, Town};

/// Which records a truncate removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateScope {
    /// Every record from every town.
    All,
    /// Only records imported from one town.
    Town(Town),
}

/// Abstract storage backend for permit records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](PermitStore::exists) | Exact match on the seven-field dedup key |
/// | [`insert`](PermitStore::insert) | Store a new record, returning its id |
/// | [`truncate`](PermitStore::truncate) | Bulk delete |
/// | [`rebuild_search_index`](PermitStore::rebuild_search_index) | Rebuild the full-text index from stored records |
/// | [`count`](PermitStore::count) | Number of stored records |
/// | [`list`](PermitStore::list) | All stored records in insertion order |
/// | [`search`](PermitStore::search) | Full-text query against the last rebuilt index |
#[async_trait]
pub trait PermitStore: Send + Sync {
    /// Whether a record with exactly this key is already stored.
    ///
    /// Absent fields only match absent fields.
    async fn exists(&self, key: &DedupKey) -> Result<bool>;

    /// Insert a new record. Identity is assigned by the store.
    async fn insert(&self, record: &PermitRecord) -> Result<i64>;

    /// Delete records in `scope`, returning how many were removed.
    async fn truncate(&self, scope: TruncateScope) -> Result<u64>;

    /// Rebuild the full-text index. Inserted records are not searchable
    /// until this runs.
    async fn rebuild_search_index(&self) -> Result<()>;

    async fn count(&self, town: Option<Town>) -> Result<i64>;

    async fn list(&self, town: Option<Town>) -> Result<Vec<StoredPermit>>;

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PermitHit>>;
}
