use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "fkguard.toml";

/// Environment variables consulted for the connection string, in order.
pub const DATABASE_URL_VARS: [&str; 2] = ["FKGUARD_DATABASE_URL", "DATABASE_URL"];

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(
        "no database url: pass --database-url, set FKGUARD_DATABASE_URL or DATABASE_URL, \
         or add database_url to {DEFAULT_CONFIG_FILE}"
    )]
    MissingDatabaseUrl,
    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Contents of `fkguard.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub excluded_schemas: Vec<String>,
    pub log_file: Option<PathBuf>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
    pub log_file: Option<PathBuf>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub excluded_schemas: Vec<String>,
    pub log_file: Option<PathBuf>,
}

/// Load an explicit config file, or `fkguard.toml` when it exists.
pub fn load_file_config(path: Option<&Path>) -> ConfigResult<FileConfig> {
    match path {
        Some(path) => read_file_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                read_file_config(default)
            } else {
                Ok(FileConfig::default())
            }
        }
    }
}

fn read_file_config(path: &Path) -> ConfigResult<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Settings {
    /// Merge flags, environment and file values, highest precedence first.
    pub fn resolve<E>(overrides: Overrides, file: FileConfig, env: E) -> ConfigResult<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let database_url = overrides
            .database_url
            .or_else(|| {
                DATABASE_URL_VARS
                    .iter()
                    .find_map(|key| env(key).filter(|value| !value.trim().is_empty()))
            })
            .or(file.database_url)
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = overrides
            .max_connections
            .or(file.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let acquire_timeout_secs = file
            .acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);
        if acquire_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "acquire_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            excluded_schemas: file.excluded_schemas,
            log_file: overrides.log_file.or(file.log_file),
        })
    }
}
