use crate::error::CoreError;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// bcrypt only reads this many bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Rejects passwords bcrypt would silently truncate.
pub fn check_password_length(password: &str) -> Result<(), CoreError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CoreError::InvalidInput(
            "password".to_string(),
            format!("longer than {MAX_PASSWORD_BYTES} bytes"),
        ));
    }
    Ok(())
}

/// A stored user record.
///
/// Field names on disk are the keys the document collection already uses
/// (`_id`, `username`, `password`, `firstName`, `lastName`). The `password`
/// field holds a bcrypt hash, never the plaintext.
///
/// Older documents may lack any of the text fields; they read back as empty
/// strings (`username`, `password`) or `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Input for registering a user. `password` is plaintext here and is hashed
/// before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_names(
        mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }

    /// Checks that the login fields are present and the password fits bcrypt.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut missing = Vec::new();
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(CoreError::MissingFields(missing));
        }
        check_password_length(&self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_uses_original_document_keys() {
        let user = User {
            id: ObjectId::new(),
            username: "hari".to_string(),
            password: "$2b$04$hash".to_string(),
            first_name: Some("Hari".to_string()),
            last_name: None,
        };
        let doc = bson::to_document(&user).unwrap();
        assert!(doc.contains_key("_id"));
        assert_eq!(doc.get_str("firstName").unwrap(), "Hari");
        assert!(!doc.contains_key("lastName"));
        assert!(!doc.contains_key("first_name"));
    }

    #[test]
    fn user_ignores_foreign_version_key() {
        let id = ObjectId::new();
        let doc = bson::doc! {
            "_id": id,
            "username": "hari",
            "password": "secret",
            "__v": 0,
        };
        let user: User = bson::from_document(doc).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.first_name, None);
    }

    #[test]
    fn user_stored_without_login_fields_still_reads() {
        let id = ObjectId::new();
        let user: User =
            bson::from_document(bson::doc! { "_id": id, "firstName": "O", "__v": 0 }).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "");
        assert_eq!(user.password, "");
        assert_eq!(user.first_name.as_deref(), Some("O"));

        let bare: User = bson::from_document(bson::doc! { "_id": id, "__v": 0 }).unwrap();
        assert_eq!(bare.username, "");
        assert_eq!(bare.first_name, None);
    }

    #[test]
    fn password_longer_than_bcrypt_reads_is_rejected() {
        let at_limit = "a".repeat(MAX_PASSWORD_BYTES);
        assert!(NewUser::new("hari", at_limit).validate().is_ok());

        let too_long = "a".repeat(MAX_PASSWORD_BYTES + 1);
        let err = NewUser::new("hari", too_long).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(ref field, _) if field == "password"));
    }

    #[test]
    fn new_user_requires_login_fields() {
        let err = NewUser::new("  ", "").validate().unwrap_err();
        assert_eq!(err, CoreError::MissingFields(vec!["username", "password"]));
        assert!(NewUser::new("hari", "pw").validate().is_ok());
    }

    #[test]
    fn new_user_accepts_camel_case_json() {
        let input: NewUser = serde_json::from_str(
            r#"{"username":"hari","password":"pw","firstName":"Hari","lastName":"Om"}"#,
        )
        .unwrap();
        assert_eq!(input, NewUser::new("hari", "pw").with_names("Hari", "Om"));
    }
}
