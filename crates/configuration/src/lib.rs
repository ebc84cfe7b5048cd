use crate::error::ConfigError;
use std::env;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    AlertsConfig, AnalyticsConfig, Config, LogFormat, LoggingConfig, PipelineConfig,
    ServerConfig, StoreConfig, TelegramConfig, ThresholdConfig,
};

/// The file read when no explicit path is given. It is optional.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads and validates the application configuration.
///
/// Sources, lowest precedence first:
/// 1. built-in defaults,
/// 2. the TOML file at `path` (required when given, optional `config.toml` otherwise),
/// 3. `FORECASTER__SECTION__KEY` environment variables,
/// 4. the shorthand variables `GA4_PROPERTY_ID`, `GA4_ACCESS_TOKEN` and `ADMIN_EMAIL`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("FORECASTER")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("analytics.property_id", env::var("GA4_PROPERTY_ID").ok())?
        .set_override_option("analytics.access_token", env::var("GA4_ACCESS_TOKEN").ok())?
        .set_override_option("alerts.admin_email", env::var("ADMIN_EMAIL").ok())?
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
