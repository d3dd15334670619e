//! Configuration management for the cataloger server

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::decorations::DEFAULT_CACHE_CAPACITY;
use crate::search::DEFAULT_BDRC_ENDPOINT;
use crate::submission::Vocabulary;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
    pub annotations: AnnotationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions idle this long are closed; 0 keeps them forever
    pub session_idle_secs: u64,
}

impl ServerConfig {
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
    }
}

/// OpenPecha catalog API, used for submission and suggestions
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub debounce_ms: u64,
    pub max_retries: u32,
    pub page_size: usize,
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    pub vocabulary: Vocabulary,
    pub projection_cache_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                session_idle_secs: 3600,
            },
            catalog: CatalogConfig {
                endpoint: None,
                timeout_secs: 30,
            },
            search: SearchConfig {
                endpoint: DEFAULT_BDRC_ENDPOINT.to_string(),
                debounce_ms: 750,
                max_retries: 3,
                page_size: 20,
            },
            annotations: AnnotationConfig {
                vocabulary: Vocabulary::default(),
                projection_cache_size: DEFAULT_CACHE_CAPACITY,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse(&lookup, "SERVER_PORT", defaults.server.port)?,
                session_idle_secs: parse(
                    &lookup,
                    "SESSION_IDLE_TIMEOUT_SECS",
                    defaults.server.session_idle_secs,
                )?,
            },
            catalog: CatalogConfig {
                endpoint: lookup("OPENPECHA_ENDPOINT").filter(|s| !s.trim().is_empty()),
                timeout_secs: parse(&lookup, "CATALOG_TIMEOUT_SECS", defaults.catalog.timeout_secs)?,
            },
            search: SearchConfig {
                endpoint: lookup("BDRC_ENDPOINT").unwrap_or(defaults.search.endpoint),
                debounce_ms: parse(&lookup, "SEARCH_DEBOUNCE_MS", defaults.search.debounce_ms)?,
                max_retries: parse(&lookup, "SEARCH_MAX_RETRIES", defaults.search.max_retries)?,
                page_size: parse(&lookup, "SEARCH_PAGE_SIZE", defaults.search.page_size)?,
            },
            annotations: AnnotationConfig {
                vocabulary: parse(
                    &lookup,
                    "BIBLIOGRAPHY_VOCABULARY",
                    defaults.annotations.vocabulary,
                )?,
                projection_cache_size: parse(
                    &lookup,
                    "PROJECTION_CACHE_SIZE",
                    defaults.annotations.projection_cache_size,
                )?,
            },
        })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
