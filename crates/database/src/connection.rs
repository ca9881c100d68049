use crate::error::DbError;
use crate::store::MongoStore;
use bson::doc;
use configuration::DatabaseSettings;
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::time::Duration;

/// Establishes a connection pool to the document store.
///
/// The URI is parsed, the pool is configured from `settings`, and a `ping`
/// is sent so that an unreachable host or bad credentials fail here rather
/// than on the first read or write. There is no retry.
pub async fn connect(settings: &DatabaseSettings) -> Result<MongoStore, DbError> {
    let mut options = ClientOptions::parse(settings.uri.as_str()).await.map_err(|e| {
        DbError::ConnectionConfigError(format!(
            "invalid connection URI {}: {}",
            settings.redacted_uri(),
            e
        ))
    })?;
    options.app_name = Some(settings.app_name.clone());
    options.max_pool_size = Some(settings.max_pool_size);
    options.server_selection_timeout =
        Some(Duration::from_secs(settings.server_selection_timeout_secs));

    let database_name = resolve_database_name(settings, options.default_database.as_deref())?;

    let client = Client::with_options(options).map_err(DbError::ConnectionError)?;
    let database = client.database(&database_name);
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(DbError::ConnectionError)?;

    tracing::info!(
        uri = %settings.redacted_uri(),
        database = %database_name,
        "Connected to document store"
    );
    Ok(MongoStore::new(client, database))
}

/// The configured database name wins over the one in the URI path.
fn resolve_database_name(
    settings: &DatabaseSettings,
    uri_default: Option<&str>,
) -> Result<String, DbError> {
    settings
        .database_name
        .as_deref()
        .or(uri_default)
        .map(str::to_string)
        .ok_or_else(|| {
            DbError::ConnectionConfigError(
                "no database named in the connection URI path or in database.database_name"
                    .to_string(),
            )
        })
}
