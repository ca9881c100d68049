use super::DocumentStore;
use crate::error::DbError;
use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl MemoryCollection {
    /// Finds a unique field on which `candidate` collides with a stored
    /// document other than the one at `skip`.
    fn conflict(&self, candidate: &Document, skip: Option<usize>) -> Option<String> {
        let id = candidate.get("_id").map(|value| ("_id", value));
        let indexed = self
            .unique_fields
            .iter()
            .filter_map(|field| indexed_value(candidate, field).map(|v| (field.as_str(), v)));
        id.into_iter()
            .chain(indexed)
            .find_map(|(field, value)| {
                self.documents
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != skip)
                    .any(|(_, stored)| stored.get(field) == Some(value))
                    .then(|| format!("{field}: {value}"))
            })
    }
}

/// Unique indexes only cover string values, like the partial index the
/// live store creates.
fn indexed_value<'a>(document: &'a Document, field: &str) -> Option<&'a Bson> {
    document
        .get(field)
        .filter(|value| matches!(value, Bson::String(_)))
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match document.get(key) {
        Some(actual) => actual == expected,
        None => matches!(expected, Bson::Null),
    })
}

/// A process-local document store.
///
/// Behaves like the live store for everything the record handles rely on:
/// equality filters, `$set` updates, and unique indexes (including the
/// implicit one on `_id`). Nothing is persisted.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DbError> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();
        if let Some(detail) = target.conflict(&document, None) {
            return Err(DbError::DuplicateKey {
                collection: collection.to_string(),
                detail,
            });
        }
        target.documents.push(document);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, DbError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.iter().find(|d| matches_filter(d, &filter)))
            .cloned())
    }

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| matches_filter(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: Document,
    ) -> Result<bool, DbError> {
        let mut collections = self.collections.write().await;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(index) = target.documents.iter().position(|d| matches_filter(d, &filter)) else {
            return Ok(false);
        };

        let mut updated = target.documents[index].clone();
        for (key, value) in changes {
            updated.insert(key, value);
        }
        if let Some(detail) = target.conflict(&updated, Some(index)) {
            return Err(DbError::DuplicateKey {
                collection: collection.to_string(),
                detail,
            });
        }
        target.documents[index] = updated;
        Ok(true)
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), DbError> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();
        if target.unique_fields.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut seen: Vec<&Bson> = Vec::new();
        for value in target.documents.iter().filter_map(|d| indexed_value(d, field)) {
            if seen.contains(&value) {
                return Err(DbError::DuplicateKey {
                    collection: collection.to_string(),
                    detail: format!("{field}: {value}"),
                });
            }
            seen.push(value);
        }
        target.unique_fields.push(field.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    #[tokio::test]
    async fn filters_match_on_every_key() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": 1, "a": "x", "b": 2 }).await.unwrap();
        store.insert_one("c", doc! { "_id": 2, "a": "x", "b": 3 }).await.unwrap();

        assert_eq!(store.find_many("c", doc! { "a": "x" }).await.unwrap().len(), 2);
        let found = store.find_one("c", doc! { "a": "x", "b": 3 }).await.unwrap().unwrap();
        assert_eq!(found.get_i32("_id").unwrap(), 2);
        assert!(store.find_one("c", doc! { "missing": "x" }).await.unwrap().is_none());
        assert!(store.find_one("other", doc! {}).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();
        store.insert_one("c", doc! { "_id": id }).await.unwrap();
        let err = store.insert_one("c", doc! { "_id": id }).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));
        assert_eq!(store.count("c").await, 1);
    }

    #[tokio::test]
    async fn unique_index_guards_inserts_and_updates() {
        let store = InMemoryStore::new();
        store.create_unique_index("users", "username").await.unwrap();
        store.create_unique_index("users", "username").await.unwrap();
        store.insert_one("users", doc! { "_id": 1, "username": "a" }).await.unwrap();
        store.insert_one("users", doc! { "_id": 2, "username": "b" }).await.unwrap();

        let err = store
            .insert_one("users", doc! { "_id": 3, "username": "a" })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));

        let err = store
            .update_one("users", doc! { "_id": 2 }, doc! { "username": "a" })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));

        // Re-setting a document's own value is not a conflict.
        assert!(store
            .update_one("users", doc! { "_id": 1 }, doc! { "username": "a" })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn documents_without_the_field_are_not_indexed() {
        let store = InMemoryStore::new();
        store.insert_one("users", doc! { "_id": 1 }).await.unwrap();
        store.insert_one("users", doc! { "_id": 2 }).await.unwrap();
        store.create_unique_index("users", "username").await.unwrap();
        store.insert_one("users", doc! { "_id": 3 }).await.unwrap();
        assert_eq!(store.count("users").await, 3);
    }

    #[tokio::test]
    async fn index_creation_fails_on_existing_duplicates() {
        let store = InMemoryStore::new();
        store.insert_one("users", doc! { "_id": 1, "username": "a" }).await.unwrap();
        store.insert_one("users", doc! { "_id": 2, "username": "a" }).await.unwrap();
        assert!(store.create_unique_index("users", "username").await.is_err());
    }

    #[tokio::test]
    async fn update_reports_whether_anything_matched() {
        let store = InMemoryStore::new();
        assert!(!store.update_one("c", doc! { "_id": 1 }, doc! { "v": 1 }).await.unwrap());

        store.insert_one("c", doc! { "_id": 1, "v": 0 }).await.unwrap();
        assert!(store.update_one("c", doc! { "_id": 1 }, doc! { "v": 5 }).await.unwrap());
        let stored = store.find_one("c", doc! { "_id": 1 }).await.unwrap().unwrap();
        assert_eq!(stored.get_i32("v").unwrap(), 5);
    }
}
