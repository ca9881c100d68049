//! The seam between record handles and the document database.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use crate::error::DbError;
use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

/// A generic document store.
///
/// Record handles only ever talk to this trait, so they run unchanged
/// against a live MongoDB deployment (`MongoStore`) or a process-local
/// store (`InMemoryStore`). Filters are top-level equality matches.
#[async_trait]
pub trait DocumentStore: Debug + Send + Sync {
    /// Inserts a document. The caller assigns `_id`.
    ///
    /// Violating a unique index fails with `DbError::DuplicateKey`.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DbError>;

    async fn find_one(&self, collection: &str, filter: Document)
    -> Result<Option<Document>, DbError>;

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError>;

    /// Sets `changes` on the first document matching `filter`.
    ///
    /// Returns `false` when nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> Result<bool, DbError>;

    /// Creates a unique index over the string values of a single field.
    /// Documents where the field is missing or not a string are not indexed.
    /// Idempotent.
    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), DbError>;
}
