use bson::oid::ObjectId;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection configuration: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[source] mongodb::error::Error),

    #[error("Database operation failed: {0}")]
    QueryError(#[from] mongodb::error::Error),

    #[error("Record failed validation: {0}")]
    Validation(#[from] CoreError),

    #[error("Failed to encode a record as BSON: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Failed to decode a stored document: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("A document with the same unique key already exists in '{collection}': {detail}")]
    DuplicateKey { collection: String, detail: String },

    #[error("Username '{0}' is already taken.")]
    UsernameTaken(String),

    #[error("No user exists with id {0}.")]
    UnknownUser(ObjectId),

    #[error("A blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("The requested data was not found in the database.")]
    NotFound,
}
