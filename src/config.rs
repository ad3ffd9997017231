use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sms: SmsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "otp-signup".to_string(),
            env: "development".to_string(),
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

fn default_issuer() -> String {
    "otp-signup".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub length: usize,
    pub expires_in: u64, // seconds
    pub hash_cost: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            expires_in: 300,
            hash_cost: 8,
        }
    }
}

impl OtpConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub otp_per_hour: u64,
    pub max_verify_attempts: u64,
    pub attempt_window: u64, // seconds
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            otp_per_hour: 5,
            max_verify_attempts: 10,
            attempt_window: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub timeout_ms: u64,
    /// Shared ephemeral store. Without it each process keeps its own in-memory store,
    /// which is only correct for a single instance.
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            redis_url: None,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmsProvider {
    #[default]
    Log,
    Twilio,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    #[serde(default)]
    pub provider: SmsProvider,
    #[serde(default)]
    pub twilio: TwilioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_defaults()?,
            Err(e) => {
                return Err(format!("Unable to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_env_defaults() -> Result<Self, Box<dyn std::error::Error>> {
        fn get_env(name: &str) -> Option<String> {
            env::var(name).ok()
        }
        fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<T>().ok())
                .unwrap_or(default)
        }

        let database_url = get_env("DATABASE_URL")
            .ok_or("DATABASE_URL is not set and no config.toml was found")?;

        Ok(Config {
            app: AppConfig::default(),
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
                issuer: default_issuer(),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 900i64),
                refresh_token_expires_in: get_env_parse("JWT_REFRESH_EXPIRES_IN", 604_800i64),
            },
            otp: OtpConfig::default(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            sms: SmsConfig::default(),
        })
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("APP_ENV") {
            self.app.env = v;
        }
        if let Some(v) = var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Some(v) = var("CORS_ALLOWED_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Some(v) = var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(v) = var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(v) = var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Some(v) = var("OTP_LENGTH")
            && let Ok(n) = v.parse()
        {
            self.otp.length = n;
        }
        if let Some(v) = var("OTP_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.otp.expires_in = n;
        }
        if let Some(v) = var("OTP_HASH_COST")
            && let Ok(n) = v.parse()
        {
            self.otp.hash_cost = n;
        }
        if let Some(v) = var("RATE_LIMIT_OTP_PER_HOUR")
            && let Ok(n) = v.parse()
        {
            self.rate_limit.otp_per_hour = n;
        }
        if let Some(v) = var("RATE_LIMIT_MAX_VERIFY_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            self.rate_limit.max_verify_attempts = n;
        }
        if let Some(v) = var("RATE_LIMIT_ATTEMPT_WINDOW")
            && let Ok(n) = v.parse()
        {
            self.rate_limit.attempt_window = n;
        }
        if let Some(v) = var("REDIS_URL") {
            self.store.redis_url = Some(v);
        }
        if let Some(v) = var("STORE_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.store.timeout_ms = n;
        }
        if let Some(v) = var("SMS_PROVIDER") {
            match v.to_ascii_lowercase().as_str() {
                "twilio" => self.sms.provider = SmsProvider::Twilio,
                "log" => self.sms.provider = SmsProvider::Log,
                other => log::warn!("Ignoring unknown SMS_PROVIDER value: {other}"),
            }
        }
        if let Some(v) = var("TWILIO_ACCOUNT_SID") {
            self.sms.twilio.account_sid = v;
        }
        if let Some(v) = var("TWILIO_AUTH_TOKEN") {
            self.sms.twilio.auth_token = v;
        }
        if let Some(v) = var("TWILIO_FROM_PHONE") {
            self.sms.twilio.from_phone = v;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::ConfigError("invalid port number: 0".to_string()));
        }
        if self.database.url.is_empty() {
            return Err(AppError::ConfigError("database url is required".to_string()));
        }
        if !(4..=10).contains(&self.otp.length) {
            return Err(AppError::ConfigError(format!(
                "otp.length must be between 4 and 10, got {}",
                self.otp.length
            )));
        }
        if !(4..=31).contains(&self.otp.hash_cost) {
            return Err(AppError::ConfigError(format!(
                "otp.hash_cost must be between 4 and 31, got {}",
                self.otp.hash_cost
            )));
        }
        if self.otp.expires_in == 0
            || self.rate_limit.attempt_window == 0
            || self.store.timeout_ms == 0
            || self.jwt.access_token_expires_in <= 0
            || self.jwt.refresh_token_expires_in <= 0
        {
            return Err(AppError::ConfigError(
                "time-to-live and timeout values must be positive".to_string(),
            ));
        }
        if self.rate_limit.otp_per_hour == 0 || self.rate_limit.max_verify_attempts == 0 {
            return Err(AppError::ConfigError(
                "rate limit caps must be positive".to_string(),
            ));
        }
        if self.app.is_production()
            && (self.jwt.secret.is_empty() || self.jwt.secret == DEFAULT_JWT_SECRET)
        {
            return Err(AppError::ConfigError(
                "JWT secret must be changed in production".to_string(),
            ));
        }
        if self.sms.provider == SmsProvider::Twilio && self.sms.twilio.account_sid.is_empty() {
            return Err(AppError::ConfigError(
                "twilio account_sid is required when sms.provider = \"twilio\"".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [database]
        url = "postgres://localhost/otp"
        max_connections = 5

        [jwt]
        secret = "test-secret"
        access_token_expires_in = 900
        refresh_token_expires_in = 604800
    "#;

    #[test]
    fn test_parse_applies_section_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.otp.length, 6);
        assert_eq!(config.otp.expires_in, 300);
        assert_eq!(config.rate_limit.otp_per_hour, 5);
        assert_eq!(config.rate_limit.max_verify_attempts, 10);
        assert_eq!(config.jwt.issuer, "otp-signup");
        assert_eq!(config.sms.provider, SmsProvider::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_default_secret_in_production() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.app.env = "production".to_string();
        config.jwt.secret = DEFAULT_JWT_SECRET.to_string();
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        config.app.env = "development".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_otp_settings() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.otp.length = 3;
        assert!(config.validate().is_err());

        config.otp.length = 6;
        config.otp.hash_cost = 2;
        assert!(config.validate().is_err());

        config.otp.hash_cost = 8;
        config.rate_limit.max_verify_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_cover_rate_limit_and_store() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        let vars = std::collections::HashMap::from([
            ("RATE_LIMIT_ATTEMPT_WINDOW", "900"),
            ("RATE_LIMIT_MAX_VERIFY_ATTEMPTS", "4"),
            ("REDIS_URL", "redis://cache:6379"),
            ("STORE_TIMEOUT_MS", "not-a-number"),
        ]);
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.rate_limit.attempt_window, 900);
        assert_eq!(config.rate_limit.max_verify_attempts, 4);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        // Unparseable values keep the previous setting.
        assert_eq!(config.store.timeout_ms, 2000);
    }
}
