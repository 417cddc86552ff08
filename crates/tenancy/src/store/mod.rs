//! Data-access layer.
//!
//! The tenancy layer does not execute queries itself. It needs a store that
//! can enumerate rows of a type and persist writes; everything tenant-related
//! (scoping, auto-assignment, immutability, validation) happens in the
//! [`Repository`] wrapped around it.
//!
//! - [`Record`] - a dynamic row with change tracking
//! - [`RecordStore`] - the storage interface
//! - [`MemoryStore`] - an in-memory implementation
//! - [`Repository`] - scoped reads and guarded writes

mod memory;
mod record;
mod repository;

pub use memory::MemoryStore;
pub use record::Record;
pub use repository::Repository;

use serde_json::Value;

use crate::error::TenancyResult;

/// Storage interface consumed by the tenancy layer.
///
/// Implementations return rows without any tenant filtering; the
/// [`Repository`] applies scoping on top.
pub trait RecordStore: Send + Sync {
    /// Returns the primary key field of the entity type.
    fn primary_key(&self, entity_type: &str) -> String;

    /// Returns every row of the entity type.
    fn rows(&self, entity_type: &str) -> Vec<Record>;

    /// Persists a new record, assigning a primary key if it has none.
    fn insert(&self, record: Record) -> TenancyResult<Record>;

    /// Persists changes to an existing record.
    fn update(&self, record: Record) -> TenancyResult<Record>;

    /// Deletes a row by primary key, returning whether it existed.
    fn delete(&self, entity_type: &str, key: &Value) -> TenancyResult<bool>;
}
