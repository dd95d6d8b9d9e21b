use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_GRPC_PORT: u16 = 50051;
const CONFIG_DIR: &str = "config";
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_MESSAGE_QUEUE_BACKEND: &str = "in-memory";
const DEFAULT_CONSUMER_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_BASKET_ITEM_TOPIC: &str = "basket_item_topic";
const DEFAULT_BASKET_TO_ORDER_TOPIC: &str = "basket_to_order_topic";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (notifications and the redis queue backend)
    pub redis_url: String,

    /// gRPC bind address
    pub grpc_host: String,

    /// gRPC port (1024-65535)
    #[serde(default = "default_grpc_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub grpc_port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB acquire timeout (seconds)
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// DB idle timeout (seconds)
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Upper bound for one basket conversion, transaction included
    #[serde(default = "default_conversion_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub conversion_timeout_secs: u64,

    /// Largest page a list operation returns
    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub max_page_size: u64,

    /// Send user notifications through redis
    #[serde(default = "default_true_bool")]
    pub notifications_enabled: bool,

    /// Queue backend: "in-memory" or "redis"
    #[serde(default = "default_message_queue_backend")]
    #[validate(custom = "validate_message_queue_backend")]
    pub message_queue_backend: String,

    /// Sleep between empty polls (milliseconds)
    #[serde(default = "default_consumer_poll_interval_ms")]
    pub consumer_poll_interval_ms: u64,

    #[serde(default = "default_basket_item_topic")]
    pub basket_item_topic: String,

    #[serde(default = "default_basket_to_order_topic")]
    pub basket_to_order_topic: String,
}

impl AppConfig {
    pub fn new(database_url: String, redis_url: String, environment: String) -> Self {
        Self {
            database_url,
            redis_url,
            grpc_host: "0.0.0.0".to_string(),
            grpc_port: default_grpc_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            conversion_timeout_secs: default_conversion_timeout_secs(),
            max_page_size: default_max_page_size(),
            notifications_enabled: default_true_bool(),
            message_queue_backend: default_message_queue_backend(),
            consumer_poll_interval_ms: default_consumer_poll_interval_ms(),
            basket_item_topic: default_basket_item_topic(),
            basket_to_order_topic: default_basket_to_order_topic(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.grpc_host, self.grpc_port)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    pub fn consumer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_interval_ms)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_grpc_port() -> u16 {
    DEFAULT_GRPC_PORT
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
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_conversion_timeout_secs() -> u64 {
    DEFAULT_CONVERSION_TIMEOUT_SECS
}

fn default_max_page_size() -> u64 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_true_bool() -> bool {
    true
}

fn default_message_queue_backend() -> String {
    DEFAULT_MESSAGE_QUEUE_BACKEND.to_string()
}

fn default_consumer_poll_interval_ms() -> u64 {
    DEFAULT_CONSUMER_POLL_INTERVAL_MS
}

fn default_basket_item_topic() -> String {
    DEFAULT_BASKET_ITEM_TOPIC.to_string()
}

fn default_basket_to_order_topic() -> String {
    DEFAULT_BASKET_TO_ORDER_TOPIC.to_string()
}

fn validate_message_queue_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("message_queue_backend");
            err.message = Some("Must be one of: in-memory, redis".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("flash_sale_orders={},sea_orm=warn", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(CONFIG_DIR, &run_env)
}

pub fn load_config_from(config_dir: &str, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://flash_sale_orders.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("grpc_host", "0.0.0.0")?
        .set_default("grpc_port", DEFAULT_GRPC_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
