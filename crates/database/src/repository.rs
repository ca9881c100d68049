use crate::DbError;
use crate::store::DocumentStore;
use bson::oid::ObjectId;
use bson::{doc, Document};
use configuration::DatabaseSettings;
use core_types::{Account, CoreError, NewAccount, NewUser, User, check_password_length};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Names of the collections each record type lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Historically `payments`, not `users`. Existing data lives there.
    pub users: String,
    /// Mongoose pluralised the `Account` model to `accounts`.
    pub accounts: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            users: "payments".to_string(),
            accounts: "accounts".to_string(),
        }
    }
}

impl From<&DatabaseSettings> for CollectionNames {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            users: settings.users_collection.clone(),
            accounts: settings.accounts_collection.clone(),
        }
    }
}

/// The `DbRepository` provides a high-level, application-specific interface
/// to the document store, handing out typed handles for each record type.
#[derive(Debug, Clone)]
pub struct DbRepository {
    store: Arc<dyn DocumentStore>,
    collections: CollectionNames,
    password_hash_cost: u32,
}

impl DbRepository {
    /// Creates a new `DbRepository` over a connected store.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: CollectionNames,
        password_hash_cost: u32,
    ) -> Self {
        Self {
            store,
            collections,
            password_hash_cost,
        }
    }

    /// Creates the unique index on usernames.
    ///
    /// Only string usernames are indexed, so older documents without one do
    /// not collide. Fails with `DbError::DuplicateKey` while duplicate
    /// usernames remain; the handles keep working without the index, with
    /// `UserHandle::create` still checking for an existing username first.
    /// Accounts are deliberately not unique per user.
    pub async fn ensure_indexes(&self) -> Result<(), DbError> {
        self.store
            .create_unique_index(&self.collections.users, "username")
            .await
    }

    pub fn collections(&self) -> &CollectionNames {
        &self.collections
    }

    pub fn users(&self) -> UserHandle {
        UserHandle {
            store: Arc::clone(&self.store),
            collection: self.collections.users.clone(),
            password_hash_cost: self.password_hash_cost,
        }
    }

    pub fn accounts(&self) -> AccountHandle {
        AccountHandle {
            store: Arc::clone(&self.store),
            collection: self.collections.accounts.clone(),
            users_collection: self.collections.users.clone(),
        }
    }
}

/// bcrypt is CPU-bound, so it runs on the blocking pool.
async fn hash_password(password: String, cost: u32) -> Result<String, DbError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(
    password: String,
    hash: String,
) -> Result<bcrypt::BcryptResult<bool>, DbError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?)
}

fn decode<T: DeserializeOwned>(document: Option<Document>) -> Result<Option<T>, DbError> {
    document
        .map(|d| bson::from_document(d).map_err(DbError::from))
        .transpose()
}

/// Create, read and update access to user records.
#[derive(Debug, Clone)]
pub struct UserHandle {
    store: Arc<dyn DocumentStore>,
    collection: String,
    password_hash_cost: u32,
}

impl UserHandle {
    /// Registers a user, storing a bcrypt hash of the password.
    pub async fn create(&self, input: NewUser) -> Result<User, DbError> {
        input.validate()?;
        if self.find_by_username(&input.username).await?.is_some() {
            tracing::warn!(username = %input.username, "Rejected duplicate username");
            return Err(DbError::UsernameTaken(input.username));
        }

        let user = User {
            id: ObjectId::new(),
            password: hash_password(input.password, self.password_hash_cost).await?,
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
        };

        match self
            .store
            .insert_one(&self.collection, bson::to_document(&user)?)
            .await
        {
            Ok(()) => {}
            // Lost a race with a concurrent registration; the unique index caught it.
            Err(DbError::DuplicateKey { .. }) => {
                tracing::warn!(username = %user.username, "Rejected duplicate username");
                return Err(DbError::UsernameTaken(user.username));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, DbError> {
        decode(self.store.find_one(&self.collection, doc! { "_id": id }).await?)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        decode(
            self.store
                .find_one(&self.collection, doc! { "username": username })
                .await?,
        )
    }

    /// Sets whichever display names are given and returns the updated record.
    pub async fn update_profile(
        &self,
        id: ObjectId,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User, DbError> {
        let mut changes = Document::new();
        if let Some(first_name) = first_name {
            changes.insert("firstName", first_name);
        }
        if let Some(last_name) = last_name {
            changes.insert("lastName", last_name);
        }

        if !changes.is_empty()
            && !self
                .store
                .update_one(&self.collection, doc! { "_id": id }, changes)
                .await?
        {
            return Err(DbError::NotFound);
        }
        self.find_by_id(id).await?.ok_or(DbError::NotFound)
    }

    pub async fn change_password(&self, id: ObjectId, new_password: &str) -> Result<(), DbError> {
        if new_password.is_empty() {
            return Err(CoreError::MissingFields(vec!["password"]).into());
        }
        check_password_length(new_password)?;
        let hash = hash_password(new_password.to_string(), self.password_hash_cost).await?;
        let matched = self
            .store
            .update_one(&self.collection, doc! { "_id": id }, doc! { "password": hash })
            .await?;
        if !matched {
            return Err(DbError::NotFound);
        }
        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Looks up `username` and checks `password` against the stored hash.
    ///
    /// Returns `None` for an unknown user or a wrong password. Records whose
    /// `password` is not a bcrypt hash never verify.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DbError> {
        let Some(user) = self.find_by_username(username).await? else {
            return Ok(None);
        };
        match verify_password(password.to_string(), user.password.clone()).await? {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password is not a valid bcrypt hash");
                Ok(None)
            }
        }
    }
}

/// Create, read and update access to account records.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    store: Arc<dyn DocumentStore>,
    collection: String,
    users_collection: String,
}

impl AccountHandle {
    /// Opens an account for an existing user.
    ///
    /// Both `userId` and `balance` are required, and `userId` must reference
    /// a stored user. A user may hold any number of accounts.
    pub async fn create(&self, input: NewAccount) -> Result<Account, DbError> {
        let valid = input.validate().inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected account creation");
        })?;

        let owner = self
            .store
            .find_one(&self.users_collection, doc! { "_id": valid.user_id })
            .await?;
        if owner.is_none() {
            tracing::warn!(user_id = %valid.user_id, "Rejected account for unknown user");
            return Err(DbError::UnknownUser(valid.user_id));
        }

        let account = valid.into_account(ObjectId::new());
        self.store
            .insert_one(&self.collection, bson::to_document(&account)?)
            .await?;

        tracing::info!(
            account_id = %account.id,
            user_id = %account.user_id,
            balance = %account.balance,
            "Created account"
        );
        Ok(account)
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<Account>, DbError> {
        decode(self.store.find_one(&self.collection, doc! { "_id": id }).await?)
    }

    /// All accounts that reference `user_id`.
    pub async fn find_by_user(&self, user_id: ObjectId) -> Result<Vec<Account>, DbError> {
        self.store
            .find_many(&self.collection, doc! { "userId": user_id })
            .await?
            .into_iter()
            .map(|d| bson::from_document(d).map_err(DbError::from))
            .collect()
    }

    /// Overwrites the balance and returns the updated record.
    pub async fn set_balance(&self, id: ObjectId, balance: Decimal) -> Result<Account, DbError> {
        let stored = balance.to_f64().ok_or_else(|| {
            CoreError::InvalidInput("balance".to_string(), balance.to_string())
        })?;
        let matched = self
            .store
            .update_one(&self.collection, doc! { "_id": id }, doc! { "balance": stored })
            .await?;
        if !matched {
            return Err(DbError::NotFound);
        }
        tracing::info!(account_id = %id, balance = %balance, "Balance updated");
        self.find_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
