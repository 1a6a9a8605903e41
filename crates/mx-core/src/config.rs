//! Configuration types and parsing for metrix.yml

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::default_true;
use crate::suggest::DEFAULT_SUGGESTION_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main project configuration from metrix.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// SQL dialect generated by default
    #[serde(default)]
    pub dialect: Dialect,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directories containing metric, variant, and pre-aggregation documents
    #[serde(default = "default_metric_paths")]
    pub metric_paths: Vec<String>,

    /// Variant compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Version of the bound data model; part of every cache key
    #[serde(default = "default_data_model_version")]
    pub data_model_version: String,

    /// Data model metrics are expected to be bound to (checked by `mx doctor`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model_id: Option<String>,
}

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// MySQL
    MySql,
    /// Google BigQuery
    BigQuery,
    /// DuckDB
    #[default]
    DuckDb,
    /// Snowflake
    Snowflake,
}

impl Dialect {
    /// Every supported dialect
    pub const ALL: [Dialect; 5] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::BigQuery,
        Dialect::DuckDb,
        Dialect::Snowflake,
    ];

    /// Lowercase name as written in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::BigQuery => "bigquery",
            Dialect::DuckDb => "duckdb",
            Dialect::Snowflake => "snowflake",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dialect {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "bigquery" => Ok(Dialect::BigQuery),
            "duckdb" => Ok(Dialect::DuckDb),
            "snowflake" => Ok(Dialect::Snowflake),
            other => Err(CoreError::ConfigInvalid {
                message: format!(
                    "Unknown dialect '{}'. Valid dialects: postgres, mysql, bigquery, duckdb, snowflake",
                    other
                ),
            }),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Variant compiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Longest allowed variant chain
    #[serde(default = "default_max_variant_depth")]
    pub max_variant_depth: usize,

    /// Minimum similarity (0..=1) for closest-name suggestions
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: f64,

    /// Reject `table.column` references to tables outside the join set
    #[serde(default = "default_true")]
    pub strict_references: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_variant_depth: default_max_variant_depth(),
            suggestion_threshold: default_suggestion_threshold(),
            strict_references: true,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether results are cached
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live of a cached result in seconds
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

/// Query execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Connector timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_metric_paths() -> Vec<String> {
    vec!["metrics".to_string()]
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

fn default_max_variant_depth() -> usize {
    10
}

fn default_suggestion_threshold() -> f64 {
    DEFAULT_SUGGESTION_THRESHOLD
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_data_model_version() -> String {
    "1".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for metrix.yml or metrix.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("metrix.yml");
        let yaml_path = dir.join("metrix.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        if self.metric_paths.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one metric_paths entry must be specified".to_string(),
            });
        }

        if self.compiler.max_variant_depth == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "compiler.max_variant_depth must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.compiler.suggestion_threshold) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "compiler.suggestion_threshold must be between 0 and 1, got {}",
                    self.compiler.suggestion_threshold
                ),
            });
        }

        if self.execution.timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "execution.timeout_secs must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Metric directories resolved against the project root
    pub fn metric_paths_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.metric_paths.iter().map(|p| root.join(p)).collect()
    }

    /// Database path resolved against the project root (`:memory:` is kept as-is)
    pub fn database_path(&self, root: &Path) -> String {
        if self.database.path == ":memory:" || Path::new(&self.database.path).is_absolute() {
            self.database.path.clone()
        } else {
            root.join(&self.database.path).display().to_string()
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
