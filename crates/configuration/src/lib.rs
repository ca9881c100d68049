use crate::error::ConfigError;
use config::builder::DefaultState;
use config::ConfigBuilder;
use std::env;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod overrides;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use overrides::Overrides;
pub use settings::{redact_uri, Config, DatabaseSettings, LogSettings, SecuritySettings};

/// Loads the application configuration.
///
/// Sources, lowest priority first: built-in defaults, an optional
/// `config.toml` in the working directory, then `PAYMENTS__*` environment
/// variables (e.g. `PAYMENTS__DATABASE__URI`). `DATABASE_URL`, read after
/// loading any `.env` file, is used when no other source provides a URI.
pub fn load_config() -> Result<Config, ConfigError> {
    // A missing .env file is normal outside local development.
    dotenvy::dotenv().ok();

    let builder = config::Config::builder()
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(
            config::Environment::with_prefix("PAYMENTS")
                .separator("__")
                .try_parsing(true),
        );

    build_config(builder, env::var("DATABASE_URL").ok())
}

/// Finishes a builder into a validated `Config`, using `fallback_uri` only
/// when none of the builder's sources set `database.uri`.
pub fn build_config(
    builder: ConfigBuilder<DefaultState>,
    fallback_uri: Option<String>,
) -> Result<Config, ConfigError> {
    let builder = match fallback_uri {
        Some(uri) => builder.set_default("database.uri", uri)?,
        None => builder,
    };
    let raw = builder.build()?;

    match raw.get_string("database.uri") {
        Ok(uri) if !uri.trim().is_empty() => {}
        Ok(_) | Err(config::ConfigError::NotFound(_)) => {
            return Err(ConfigError::MissingDatabaseUri);
        }
        Err(e) => return Err(e.into()),
    }

    let config = raw.try_deserialize::<Config>()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let cost = config.security.password_hash_cost;
    if !(4..=31).contains(&cost) {
        return Err(ConfigError::ValidationError(format!(
            "security.password_hash_cost must be between 4 and 31, got {cost}"
        )));
    }
    if config.database.max_pool_size == 0 {
        return Err(ConfigError::ValidationError(
            "database.max_pool_size must be at least 1".to_string(),
        ));
    }
    for (key, value) in [
        ("database.users_collection", &config.database.users_collection),
        ("database.accounts_collection", &config.database.accounts_collection),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{key} must not be empty")));
        }
    }
    if config.database.database_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "database.database_name must not be empty when set".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> ConfigBuilder<DefaultState> {
        config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml))
    }

    #[test]
    fn defaults_fill_everything_but_the_uri() {
        let config = build_config(
            from_toml("[database]\nuri = \"mongodb://localhost:27017/Paytm\"\n"),
            None,
        )
        .unwrap();

        assert_eq!(config.database.users_collection, "payments");
        assert_eq!(config.database.accounts_collection, "accounts");
        assert_eq!(config.database.max_pool_size, 10);
        assert_eq!(config.database.database_name, None);
        assert_eq!(config.security.password_hash_cost, 12);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn database_url_is_only_a_fallback() {
        let fallback = Some("mongodb://fallback/Paytm".to_string());

        let config = build_config(from_toml(""), fallback.clone()).unwrap();
        assert_eq!(config.database.uri, "mongodb://fallback/Paytm");

        let config = build_config(
            from_toml("[database]\nuri = \"mongodb://primary/Paytm\"\n"),
            fallback,
        )
        .unwrap();
        assert_eq!(config.database.uri, "mongodb://primary/Paytm");
    }

    #[test]
    fn missing_uri_is_reported() {
        let err = build_config(from_toml("[security]\npassword_hash_cost = 10\n"), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUri));

        let err = build_config(from_toml("[database]\nuri = \"  \"\n"), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUri));
    }

    #[test]
    fn out_of_range_hash_cost_is_rejected() {
        let err = build_config(
            from_toml("[database]\nuri = \"mongodb://db\"\n[security]\npassword_hash_cost = 3\n"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn collection_names_can_be_overridden() {
        let config = build_config(
            from_toml(
                "[database]\nuri = \"mongodb://db\"\nusers_collection = \"users\"\ndatabase_name = \"Ledger\"\n",
            ),
            None,
        )
        .unwrap();
        assert_eq!(config.database.users_collection, "users");
        assert_eq!(config.database.database_name.as_deref(), Some("Ledger"));
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let mut config =
            build_config(from_toml("[database]\nuri = \"mongodb://db/Paytm\"\n"), None).unwrap();
        Overrides {
            database_name: Some("Staging".to_string()),
            log_level: Some("debug".to_string()),
        }
        .apply(&mut config);
        assert_eq!(config.database.database_name.as_deref(), Some("Staging"));
        assert_eq!(config.logging.level, "debug");
    }
}
