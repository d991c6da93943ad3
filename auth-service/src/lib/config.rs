use std::env;

use auth::TotpAlgorithm;
use auth::TotpConfig;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub mfa: MfaConfig,
    pub refresh_token: RefreshTokenConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// PKCS#8 PEM private key; an ephemeral pair is generated when unreadable
    pub private_key_path: String,
    /// X.509 (SPKI) PEM public key
    pub public_key_path: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MfaConfig {
    pub issuer: String,
    pub algorithm: TotpAlgorithm,
    pub digits: u32,
    pub period: u64,
}

impl MfaConfig {
    /// TOTP parameters with the ±1 step clock-skew tolerance.
    pub fn totp(&self) -> TotpConfig {
        TotpConfig::new(self.issuer.clone())
            .with_algorithm(self.algorithm)
            .with_digits(self.digits)
            .with_period(self.period)
            .with_skew(1)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshTokenConfig {
    /// Days an expired token is kept before cleanup deletes it
    pub retention_days: i64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub from: String,
    /// Front-end origin that verification and reset links point at
    pub base_url: String,
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, JWT__ISSUER, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__ACCESS_TOKEN_TTL_SECS=900 overrides jwt.access_token_ttl_secs
            .add_source(Environment::default().separator("__"))
            .build()?;

        let config: Self = configuration.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_token.cleanup_interval_secs == 0 {
            return Err(ConfigError::Message(
                "refresh_token.cleanup_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.refresh_token.retention_days < 0 {
            return Err(ConfigError::Message(
                "refresh_token.retention_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
