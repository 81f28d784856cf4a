//! Configuration management for the reader-cfi tool

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::cfi::CollapseSide;

const DEFAULT_LOG_FILTER: &str = "reader_cfi=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogConfig,
    pub output: OutputConfig,
    pub cfi: CfiConfig,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub filter: String,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct CfiConfig {
    /// Endpoint used by `collapse` when none is given
    pub collapse_side: CollapseSide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}', expected text or json", other)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log: LogConfig {
                filter: DEFAULT_LOG_FILTER.to_string(),
            },
            output: OutputConfig {
                format: OutputFormat::Text,
            },
            cfi: CfiConfig {
                collapse_side: CollapseSide::End,
            },
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from a `.env` style file without touching the process environment
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let vars = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Config {
            log: LogConfig {
                filter: lookup("CFI_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            },
            output: OutputConfig {
                format: parse_var(&lookup, "CFI_OUTPUT")?.unwrap_or_default(),
            },
            cfi: CfiConfig {
                collapse_side: parse_var(&lookup, "CFI_COLLAPSE")?.unwrap_or_default(),
            },
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|reason| ConfigError::InvalidValue { var, value, reason }),
    }
}
