use rento_catalog::PricingConfig;
use rento_gateway::{GatewayKind, PaywayConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

const ENV_PREFIX: &str = "RENTO";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_environment() -> String {
    "development".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Redis is only used for shared rate-limit counters. Without a URL the
/// counters stay in process memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default)]
    pub provider: GatewayKind,
    pub base_url: String,
    pub merchant_id: String,
    pub api_key: String,
    #[serde(default)]
    pub merchant_auth: String,
    pub callback_url: String,
    pub app_url: String,
    #[serde(default = "default_payment_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_payment_timeout_ms() -> u64 {
    15_000
}

impl PaymentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn gateway_config(&self) -> PaywayConfig {
        PaywayConfig {
            base_url: self.base_url.clone(),
            merchant_id: self.merchant_id.clone(),
            api_key: self.api_key.clone(),
            merchant_auth: self.merchant_auth.clone(),
            callback_url: self.callback_url.clone(),
            app_url: self.app_url.clone(),
            timeout: self.timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: None,
            topic: default_topic(),
        }
    }
}

fn default_topic() -> String {
    "rento.events".into()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RENTO__SERVER__PORT=8081` sets `server.port`
            .add_source(env_source(None))
            .build()?;

        s.try_deserialize()
    }

    /// Build from an in-memory TOML document, with an optional stand-in for
    /// the process environment.
    pub fn from_toml(
        toml: &str,
        environment: Option<HashMap<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .add_source(env_source(environment))
            .build()?
            .try_deserialize()
    }
}

fn env_source(environment: Option<HashMap<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(environment)
}
