pub mod account;
pub mod error;
pub mod user;

// Re-export the core types to provide a clean public API.
pub use account::{Account, NewAccount, ValidatedAccount};
pub use bson::oid::ObjectId;
pub use error::CoreError;
pub use user::{check_password_length, NewUser, User, MAX_PASSWORD_BYTES};
