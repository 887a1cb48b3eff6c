use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_SETTINGS_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_LIST_CACHE_TTL_SECS: u64 = 300;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// SMTP configuration for outbound notification email
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// When false, email is logged instead of sent (development default)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_smtp_from_email")]
    pub from_email: String,

    #[serde(default = "default_smtp_from_name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            user: String::new(),
            password: String::new(),
            from_email: default_smtp_from_email(),
            from_name: default_smtp_from_name(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL
    pub redis_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Expected JWT issuer; when unset, issuer is not validated
    #[serde(default)]
    pub jwt_issuer: Option<String>,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Rate limit: requests per window per actor per route
    #[serde(default = "default_rate_limit_requests")]
    #[validate(custom = "validate_nonzero_u32")]
    pub rate_limit_requests_per_window: u32,

    /// Rate limit: window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_seconds: u64,

    /// TTL for cached settings reads (seconds)
    #[serde(default = "default_settings_cache_ttl")]
    pub settings_cache_ttl_secs: u64,

    /// TTL for cached list endpoints (seconds)
    #[serde(default = "default_list_cache_ttl")]
    pub list_cache_ttl_secs: u64,

    /// Use Redis for the shared cache; falls back to in-memory when false
    #[serde(default = "default_true")]
    pub cache_use_redis: bool,

    /// SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_rate_limit_requests() -> u32 {
    DEFAULT_RATE_LIMIT_REQUESTS
}
fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}
fn default_settings_cache_ttl() -> u64 {
    DEFAULT_SETTINGS_CACHE_TTL_SECS
}
fn default_list_cache_ttl() -> u64 {
    DEFAULT_LIST_CACHE_TTL_SECS
}
fn default_true() -> bool {
    true
}
fn default_smtp_host() -> String {
    "localhost".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_smtp_from_email() -> String {
    "noreply@example.com".to_string()
}
fn default_smtp_from_name() -> String {
    "Back Office".to_string()
}

fn validate_nonzero_u32(value: u32) -> Result<(), ValidationError> {
    if value == 0 {
        let mut err = ValidationError::new("rate_limit_requests_per_window");
        err.message = Some("rate_limit_requests_per_window must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("backoffice_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no production default; a weak built-in is only
    // tolerated for the development profile.
    let build = |with_dev_secret: bool| -> Result<Config, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database_url", "sqlite://backoffice.db?mode=rwc")?
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("jwt_expiration", 3600)?
            .set_default("host", "0.0.0.0")?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("environment", DEFAULT_ENV)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("log_json", false)?;
        if with_dev_secret {
            builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
        }
        builder
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()
    };

    let config = build(false)?;
    let config = if config.get_string("jwt_secret").is_err() {
        if run_env != DEFAULT_ENV {
            return Err(AppConfigError::Validation(
                "jwt_secret must be provided via config file or APP__JWT_SECRET".to_string(),
            ));
        }
        build(true)?
    } else {
        config
    };

    let mut cfg: AppConfig = config.try_deserialize().map_err(AppConfigError::Config)?;

    if cfg.log_level.trim().is_empty() {
        cfg.log_level = DEFAULT_LOG_LEVEL.to_string();
    }

    cfg.validate()
        .map_err(|e| AppConfigError::Validation(e.to_string()))?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            redis_url: "redis://localhost:6379".into(),
            jwt_secret: DEV_DEFAULT_JWT_SECRET.into(),
            jwt_expiration: 3600,
            jwt_issuer: None,
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            environment: "development".into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            log_json: false,
            cors_allowed_origins: None,
            db_max_connections: 10,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            rate_limit_requests_per_window: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            settings_cache_ttl_secs: DEFAULT_SETTINGS_CACHE_TTL_SECS,
            list_cache_ttl_secs: DEFAULT_LIST_CACHE_TTL_SECS,
            cache_use_redis: true,
            smtp: SmtpConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let mut cfg = base_config();
        cfg.jwt_secret = "too-short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_rate_limit_fails_validation() {
        let mut cfg = base_config();
        cfg.rate_limit_requests_per_window = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn development_detection() {
        let mut cfg = base_config();
        assert!(cfg.is_development());
        cfg.environment = "production".into();
        assert!(!cfg.is_development());
    }
}
