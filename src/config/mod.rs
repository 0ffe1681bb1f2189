//! Configuration layer: typed settings with layered precedence (file → env).

use std::{path::Path, str::FromStr};

use config::{Config, ConfigBuilder, Environment, File, Map, builder::DefaultState};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::StoreConfig;

const LOCAL_CONFIG_BASENAME: &str = "tagcache";
const ENV_PREFIX: &str = "TAGCACHE";
const ENV_SEPARATOR: &str = "__";
const MAX_BUCKET_BITS: u32 = 16;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence: `tagcache.*` in the working
/// directory, then `path` if given, then `TAGCACHE__*` environment variables.
pub fn load(path: Option<&Path>) -> Result<Settings, LoadError> {
    load_with_env(path, None)
}

fn load_with_env(
    path: Option<&Path>,
    env: Option<Map<String, String>>,
) -> Result<Settings, LoadError> {
    let raw: RawSettings = sources(path, env).build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

fn sources(
    path: Option<&Path>,
    env: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env),
    )
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    store: StoreConfig,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { store, logging } = raw;

        let store = build_store_settings(store)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self { store, logging })
    }
}

fn build_store_settings(store: StoreConfig) -> Result<StoreConfig, LoadError> {
    if store.max_size <= 0 {
        return Err(LoadError::invalid(
            "store.max_size",
            "must be greater than zero",
        ));
    }
    if store.buckets > MAX_BUCKET_BITS {
        return Err(LoadError::invalid(
            "store.buckets",
            format!("must be at most {MAX_BUCKET_BITS} (2^{MAX_BUCKET_BITS} shards)"),
        ));
    }
    if store.items_to_prune == 0 {
        return Err(LoadError::invalid(
            "store.items_to_prune",
            "must be greater than zero",
        ));
    }
    if store.gets_per_promote == 0 {
        return Err(LoadError::invalid(
            "store.gets_per_promote",
            "must be greater than zero",
        ));
    }
    Ok(store)
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
