use super::DocumentStore;
use crate::error::DbError;
use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// The live store, backed by a pooled MongoDB client.
///
/// Created by [`crate::connect`]; cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    pub(crate) fn new(client: Client, database: Database) -> Self {
        Self { client, database }
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Closes every pooled connection. Record handles still holding a clone
    /// of this store must be dropped first.
    pub async fn shutdown(self) {
        tracing::info!(database = %self.database.name(), "Shutting down database connection pool");
        self.client.shutdown().await;
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn map_write_error(collection: &str, e: mongodb::error::Error) -> DbError {
    // Inserts report duplicates as write errors; index builds as command errors.
    let duplicate = match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY =>
        {
            Some(write_error.message.clone())
        }
        ErrorKind::Command(command_error) if command_error.code == DUPLICATE_KEY => {
            Some(command_error.message.clone())
        }
        _ => None,
    };
    match duplicate {
        Some(detail) => DbError::DuplicateKey {
            collection: collection.to_string(),
            detail,
        },
        None => DbError::QueryError(e),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DbError> {
        tracing::debug!(collection, "insert_one");
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, DbError> {
        tracing::debug!(collection, ?filter, "find_one");
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError> {
        tracing::debug!(collection, ?filter, "find_many");
        let cursor = self.collection(collection).find(filter).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> Result<bool, DbError> {
        tracing::debug!(collection, ?filter, "update_one");
        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$set": changes })
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(result.matched_count > 0)
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), DbError> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        // Older documents may lack the field; leave them out of the index.
        let mut only_strings = Document::new();
        only_strings.insert(field, doc! { "$type": "string" });
        let index = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(only_strings)
                    .build(),
            )
            .build();
        self.collection(collection)
            .create_index(index)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        tracing::debug!(collection, field, "Unique index ensured");
        Ok(())
    }
}
