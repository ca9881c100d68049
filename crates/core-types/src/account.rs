use crate::error::CoreError;
use bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stored account record, holding the balance of exactly one user.
///
/// The balance is a `Decimal` in memory and a double in the document store,
/// which is the number type every other client of the collection writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Input for opening an account. Both fields are required; they are optional
/// here so that incomplete input can be represented and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(default)]
    pub user_id: Option<ObjectId>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub balance: Option<Decimal>,
}

/// A `NewAccount` with every required field present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedAccount {
    pub user_id: ObjectId,
    pub balance: Decimal,
}

impl NewAccount {
    pub fn new(user_id: ObjectId, balance: Decimal) -> Self {
        Self {
            user_id: Some(user_id),
            balance: Some(balance),
        }
    }

    pub fn validate(&self) -> Result<ValidatedAccount, CoreError> {
        match (self.user_id, self.balance) {
            (Some(user_id), Some(balance)) => Ok(ValidatedAccount { user_id, balance }),
            (user_id, balance) => {
                let mut missing = Vec::new();
                if user_id.is_none() {
                    missing.push("userId");
                }
                if balance.is_none() {
                    missing.push("balance");
                }
                Err(CoreError::MissingFields(missing))
            }
        }
    }
}

impl ValidatedAccount {
    pub fn into_account(self, id: ObjectId) -> Account {
        Account {
            id,
            user_id: self.user_id,
            balance: self.balance,
        }
    }
}
