//! # Payments Database Crate
//!
//! This crate is the persistence layer for user credentials and account
//! balances, stored in a MongoDB document database.
//!
//! ## Architectural Principles
//!
//! - **Explicit connection:** `connect` returns a connected `MongoStore`
//!   value which is passed to `DbRepository`. There is no global connection,
//!   and handles cannot exist without a store.
//! - **Fail fast:** a malformed URI, an unreachable host or bad credentials
//!   surface as errors from `connect`. There is no retry or reconnect logic.
//! - **Store seam:** record handles are written against the `DocumentStore`
//!   trait. `InMemoryStore` implements the same contract without a server.
//!
//! ## Public API
//!
//! - `connect`: establishes the pooled connection and verifies it with a ping.
//! - `DbRepository`: hands out `UserHandle` and `AccountHandle`.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::connect;
pub use error::DbError;
pub use repository::{AccountHandle, CollectionNames, DbRepository, UserHandle};
pub use store::{DocumentStore, InMemoryStore, MongoStore};
