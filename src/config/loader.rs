//! Configuration loader with environment variable support

use super::Config;
use crate::error::{Result, SimilarityError};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Prefix for structured overrides, e.g. `GAME_SIMILARITY__BACKEND__SERVICE_URL`
pub const ENV_PREFIX: &str = "GAME_SIMILARITY";

/// Flat variables understood by the dashboard deployment, and the keys they set
const LEGACY_VARS: [(&str, &str); 6] = [
    ("SIMILARITY_FORCE_DIRECT", "backend.force_direct"),
    ("SIMILARITY_SERVICE_URL", "backend.service_url"),
    ("SIMILARITY_SERVICE_TIMEOUT", "backend.service_timeout_secs"),
    ("SIMILARITY_TABLE_ID", "warehouse.table_id"),
    ("BIGQUERY_ACCESS_TOKEN", "warehouse.access_token"),
    ("GOOGLE_APPLICATION_CREDENTIALS", "warehouse.credentials_file"),
];

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Load configuration from TOML text
pub fn load_config_from_str(toml: &str) -> Result<Config> {
    let config = config::Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Load configuration from an optional file, then the environment.
///
/// Precedence, lowest first: file, `GAME_SIMILARITY__*` variables, the flat
/// `SIMILARITY_*` variables. A `.env` file in the working directory is read
/// first if present.
pub fn load_config_with_env(path: Option<&Path>) -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let builder = apply_legacy_overrides(builder, |name| std::env::var(name).ok())?;
    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}

/// Apply the flat `SIMILARITY_*` variables found through `lookup`
pub fn apply_legacy_overrides<F>(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> Result<ConfigBuilder<DefaultState>>
where
    F: Fn(&str) -> Option<String>,
{
    for (var, key) in LEGACY_VARS {
        let Some(raw) = lookup(var) else { continue };
        let raw = raw.trim().to_string();
        if raw.is_empty() {
            continue;
        }

        builder = match key {
            "backend.force_direct" => builder.set_override(key, parse_flag(var, &raw)?)?,
            "backend.service_timeout_secs" => {
                let secs: i64 = raw.parse().map_err(|_| {
                    SimilarityError::Config(format!("{} must be a whole number of seconds", var))
                })?;
                builder.set_override(key, secs)?
            }
            _ => builder.set_override(key, raw)?,
        };
        debug!("Applied {} override", var);
    }

    Ok(builder)
}

fn parse_flag(var: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SimilarityError::Config(format!(
            "{} must be a boolean flag, got '{}'",
            var, raw
        ))),
    }
}
