use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable prefix for nested overrides, e.g. `BRAKEWEB_ENGINE__BINARY_PATH`.
pub const ENV_PREFIX: &str = "BRAKEWEB_";

/// Names the configuration file. Not a config key itself.
pub const CONFIG_PATH_ENV: &str = "BRAKEWEB_CONFIG";

/// Load configuration: defaults, then the TOML file (if any), then environment overrides.
///
/// The bare `PORT` variable wins over everything else for the listen port.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
