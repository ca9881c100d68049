use crate::settings::Config;

/// Command-line overrides layered on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct Overrides {
    /// Database to use instead of the one named in the connection URI.
    #[cfg_attr(feature = "clap", arg(long, global = true))]
    pub database_name: Option<String>,

    /// Log filter directive (e.g. "debug" or "database=trace").
    #[cfg_attr(feature = "clap", arg(long, global = true))]
    pub log_level: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(name) = &self.database_name {
            config.database.database_name = Some(name.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
