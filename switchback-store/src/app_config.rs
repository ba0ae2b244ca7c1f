use serde::Deserialize;
use std::env;
use switchback_policy::PolicyConstants;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub business_rules: PolicyConstants,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// TTL on transient seat holds taken while a booking is in flight.
    #[serde(default = "default_hold_seconds")]
    pub seat_hold_seconds: u64,
}

fn default_hold_seconds() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub checkout_secret: String,
    /// Upper bound on any call to the payment gateway.
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_seconds: u64,
}

fn default_gateway_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 60,
            window_seconds: 60,
        }
    }
}

impl Config {
    /// Layered load: config/default, then the RUN_MODE file, then an
    /// untracked config/local, then SWITCHBACK__* environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("SWITCHBACK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
