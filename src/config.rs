use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use crate::models::ScoringWeights;
use crate::services::{PoolOptions, RestTables};

const ENV_PREFIX: &str = "SKILLSWAP";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub rest: RestSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which ledger backend serves reads and writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Rest,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub backend: LedgerBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub tables: RestTables,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_secs: None,
            page_size: None,
            tables: RestTables::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub run_migrations: bool,
}

impl DatabaseSettings {
    pub fn pool_options(&self) -> PoolOptions {
        let defaults = PoolOptions::default();
        PoolOptions {
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            min_connections: self.min_connections.unwrap_or(defaults.min_connections),
            acquire_timeout_secs: self.acquire_timeout_secs.unwrap_or(defaults.acquire_timeout_secs),
            idle_timeout_secs: self.idle_timeout_secs.unwrap_or(defaults.idle_timeout_secs),
            run_migrations: self.run_migrations,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingSettings {
    pub default_limit: Option<u16>,
    pub max_limit: Option<u16>,
    pub max_concurrent_reads: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_floor")]
    pub floor: u8,
    #[serde(default = "default_category_bonus")]
    pub category_bonus: u8,
    #[serde(default = "default_overlap_bonus")]
    pub overlap_bonus: u8,
    #[serde(default = "default_overlap_cap")]
    pub overlap_cap: u8,
    #[serde(default = "default_rating_bonus")]
    pub rating_bonus: u8,
    #[serde(default = "default_swaps_bonus")]
    pub swaps_bonus: u8,
    #[serde(default = "default_swaps_saturation")]
    pub swaps_saturation: u32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            category_bonus: default_category_bonus(),
            overlap_bonus: default_overlap_bonus(),
            overlap_cap: default_overlap_cap(),
            rating_bonus: default_rating_bonus(),
            swaps_bonus: default_swaps_bonus(),
            swaps_saturation: default_swaps_saturation(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(w: &WeightsConfig) -> Self {
        ScoringWeights {
            floor: w.floor,
            category_bonus: w.category_bonus,
            overlap_bonus: w.overlap_bonus,
            overlap_cap: w.overlap_cap,
            rating_bonus: w.rating_bonus,
            swaps_bonus: w.swaps_bonus,
            swaps_saturation: w.swaps_saturation,
        }
    }
}

fn default_floor() -> u8 { 80 }
fn default_category_bonus() -> u8 { 5 }
fn default_overlap_bonus() -> u8 { 2 }
fn default_overlap_cap() -> u8 { 6 }
fn default_rating_bonus() -> u8 { 5 }
fn default_swaps_bonus() -> u8 { 5 }
fn default_swaps_saturation() -> u32 { 20 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SKILLSWAP__)
    /// 5. Hosted backend variables (SUPABASE_URL, SUPABASE_SERVICE_KEY, DATABASE_URL)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SKILLSWAP__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        with_backend_overrides(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        with_backend_overrides(settings)?.try_deserialize()
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        ScoringWeights::from(&self.scoring.weights)
    }

    /// Limit used when a request does not ask for one
    pub fn default_limit(&self) -> u16 {
        self.matching.default_limit.unwrap_or(20).clamp(1, self.max_limit())
    }

    pub fn max_limit(&self) -> u16 {
        self.matching.max_limit.unwrap_or(100).max(1)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the variables the hosted backend hands out
///
/// These take precedence over the prefixed ones so a stock `.env` from the
/// hosting dashboard works unchanged.
fn with_backend_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(endpoint) = env::var("SUPABASE_URL") {
        builder = builder.set_override("rest.endpoint", endpoint)?;
    }
    if let Ok(api_key) = env::var("SUPABASE_SERVICE_KEY") {
        builder = builder.set_override("rest.api_key", api_key)?;
    }
    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(source: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_weights() {
        let weights = ScoringWeights::from(&WeightsConfig::default());
        assert_eq!(weights, ScoringWeights::default());
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_minimal_file_fills_defaults() {
        let settings = from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            "#,
        );

        assert_eq!(settings.ledger.backend, LedgerBackend::Rest);
        assert_eq!(settings.default_limit(), 20);
        assert_eq!(settings.max_limit(), 100);
        assert_eq!(settings.rest.tables.user_skills, "user_skills");
        assert!(!settings.database.run_migrations);
    }

    #[test]
    fn test_backend_and_partial_weights() {
        let settings = from_toml(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [ledger]
            backend = "postgres"

            [matching]
            default_limit = 500
            max_limit = 50

            [scoring.weights]
            floor = 70
            "#,
        );

        assert_eq!(settings.ledger.backend, LedgerBackend::Postgres);
        assert_eq!(settings.default_limit(), 50);

        let weights = settings.scoring_weights();
        assert_eq!(weights.floor, 70);
        assert_eq!(weights.category_bonus, 5);
    }

    #[test]
    fn test_pool_options_fall_back_to_defaults() {
        let database = DatabaseSettings {
            max_connections: Some(3),
            ..DatabaseSettings::default()
        };
        let options = database.pool_options();
        assert_eq!(options.max_connections, 3);
        assert_eq!(options.min_connections, PoolOptions::default().min_connections);
    }
}
