//! Layered application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `config/default.toml`,
//! `config/{RUN_ENV}.toml`, then `APP__*` environment variables (`APP__CATALOG__MAX_PAGE_SIZE=50`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// How variant-scoped facets combine on a single item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantMatchMode {
    /// Each variant-scoped facet may be satisfied by a different variant.
    #[default]
    Independent,
    /// One variant must satisfy every variant-scoped facet at once.
    SameVariant,
}

/// Which variant price a `price_min`/`price_max` range is tested against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFilterMode {
    /// Either the promo price or the base price may fall in range.
    #[default]
    AnyPriceField,
    /// Only the price effective at query time is tested.
    Effective,
}

/// `[catalog]`
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Listing page size when the caller does not send one
    #[validate(range(min = 1, max = 1000))]
    pub default_page_size: u64,

    #[validate(range(min = 1, max = 1000))]
    pub max_page_size: u64,

    /// 0 disables the facet cache
    pub facet_cache_ttl_secs: u64,

    /// Language the catalog text is authored in
    #[validate(custom = "validate_language_code")]
    pub source_language: String,

    pub supported_languages: Vec<String>,

    /// Attribute code always grouped with variant-level facets
    pub color_attribute_code: String,

    pub variant_match: VariantMatchMode,

    pub price_filter: PriceFilterMode,

    /// Prefix for relative media paths; absent leaves stored paths untouched
    pub media_base_url: Option<String>,

    /// Ids bound per `IN (...)` when loading a scope; stays under the SQLite bind limit
    #[validate(range(min = 1, max = 30000))]
    pub snapshot_id_chunk: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_page_size: 24,
            max_page_size: 100,
            facet_cache_ttl_secs: 30,
            source_language: "fr".to_string(),
            supported_languages: vec!["fr".to_string(), "en".to_string()],
            color_attribute_code: "color".to_string(),
            variant_match: VariantMatchMode::default(),
            price_filter: PriceFilterMode::default(),
            media_base_url: None,
            snapshot_id_chunk: 500,
        }
    }
}

impl CatalogConfig {
    pub fn facet_cache_ttl(&self) -> Option<Duration> {
        (self.facet_cache_ttl_secs > 0).then(|| Duration::from_secs(self.facet_cache_ttl_secs))
    }

    fn check_consistency(&self, errors: &mut ValidationErrors) {
        if self.default_page_size > self.max_page_size {
            let mut err = ValidationError::new("default_page_size");
            err.message = Some("catalog.default_page_size must not exceed catalog.max_page_size".into());
            errors.add("catalog", err);
        }
        for lang in &self.supported_languages {
            if validate_language_code(lang).is_err() {
                let mut err = ValidationError::new("supported_languages");
                err.message = Some(format!("'{lang}' is not a two-letter language code").into());
                errors.add("catalog", err);
            }
        }
    }
}

/// `[pool]`: database connection pool sizing and timeouts
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    #[validate(range(min = 1))]
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            acquire_timeout_secs: 8,
        }
    }
}

/// `[outbox]`: relay from the outbox table to in-process subscribers
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct OutboxConfig {
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
    pub poll_interval_ms: u64,
    /// Rows dispatched per poll
    #[validate(range(min = 1, max = 10000))]
    pub batch_size: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            poll_interval_ms: 500,
            batch_size: 50,
        }
    }
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub database_url: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations at startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default)]
    #[validate]
    pub pool: PoolConfig,

    #[serde(default)]
    #[validate]
    pub outbox: OutboxConfig,

    #[serde(default)]
    #[validate]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Configuration with every tunable at its default.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            pool: PoolConfig::default(),
            outbox: OutboxConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    /// Field validation followed by the checks that span several fields.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        let mut errors = ValidationErrors::new();
        self.catalog.check_consistency(&mut errors);
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("expected one of {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

fn validate_language_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        return Ok(());
    }
    let mut err = ValidationError::new("language_code");
    err.message = Some("expected a lowercase two-letter language code".into());
    Err(err)
}

/// Installs the global subscriber. `RUST_LOG`, when set, replaces the level-derived filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("catalog_facets={level},tower_http=debug"));
    let builder = fmt().with_env_filter(EnvFilter::new(directive));

    // A second install (tests) is ignored.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// [`load_config`] reading TOML profiles from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let profile = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(profile = %profile, dir = %config_dir.display(), "Loading catalog configuration");

    let settings = Config::builder()
        .set_default("database_url", "sqlite://catalog.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("environment", DEFAULT_ENV)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&profile)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("catalog.supported_languages")
                .try_parsing(true),
        )
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    cfg.validate_all().map_err(|e| {
        error!("Invalid configuration: {}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_follow_catalog_pagination() {
        let cfg = base_config();
        assert_eq!(cfg.catalog.default_page_size, 24);
        assert_eq!(cfg.catalog.max_page_size, 100);
        assert_eq!(cfg.catalog.variant_match, VariantMatchMode::Independent);
        assert_eq!(cfg.catalog.price_filter, PriceFilterMode::AnyPriceField);
        assert_eq!(cfg.outbox.poll_interval(), Duration::from_millis(500));
        assert!(cfg.validate_all().is_ok());
    }

    #[test]
    fn default_page_size_cannot_exceed_maximum() {
        let mut cfg = base_config();
        cfg.catalog.default_page_size = 200;
        cfg.catalog.max_page_size = 100;
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn snapshot_id_chunk_stays_within_bind_limits() {
        let mut cfg = base_config();
        assert_eq!(cfg.catalog.snapshot_id_chunk, 500);
        cfg.catalog.snapshot_id_chunk = 0;
        assert!(cfg.validate_all().is_err());
        cfg.catalog.snapshot_id_chunk = 40_000;
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn rejects_malformed_language_codes() {
        let mut cfg = base_config();
        cfg.catalog.supported_languages = vec!["en".into(), "english".into()];
        assert!(cfg.validate_all().is_err());

        cfg.catalog.supported_languages = vec!["en".into()];
        cfg.catalog.source_language = "FR".into();
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn rejects_unknown_log_level_and_empty_channel() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate_all().is_err());

        let mut cfg = base_config();
        cfg.outbox.channel_capacity = 0;
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn zero_ttl_disables_facet_cache() {
        let mut catalog = CatalogConfig::default();
        assert!(catalog.facet_cache_ttl().is_some());
        catalog.facet_cache_ttl_secs = 0;
        assert!(catalog.facet_cache_ttl().is_none());
    }

    #[test]
    fn loads_sections_from_file() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "sqlite::memory:"
            environment = "development"

            [pool]
            max_connections = 4

            [catalog]
            default_page_size = 12
            variant_match = "same_variant"
            price_filter = "effective"
            color_attribute_code = "couleur"
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.catalog.default_page_size, 12);
        assert_eq!(cfg.catalog.max_page_size, 100);
        assert_eq!(cfg.catalog.variant_match, VariantMatchMode::SameVariant);
        assert_eq!(cfg.catalog.price_filter, PriceFilterMode::Effective);
        assert_eq!(cfg.catalog.color_attribute_code, "couleur");
        assert_eq!(cfg.pool.max_connections, 4);
        assert_eq!(cfg.pool.acquire_timeout_secs, 8);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }
}
