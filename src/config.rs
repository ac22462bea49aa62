use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::warn;

use crate::clients::TrustThresholds;

/// Configuration for the price catalog service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Moderation and trust configuration
    pub moderation: ModerationConfig,
    /// Blacklist expiry sweeper
    pub sweeper: SweeperConfig,
    /// Outbound notifications
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Enable API key authentication
    pub enable_auth: bool,
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Gateway API keys (`CATALOG_API_KEY`, `CATALOG_API_KEYS`); never serialized
    #[serde(default, skip_serializing)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses in-memory fallback)
    pub postgres_enabled: bool,
    /// Pool size
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable log sanitization to prevent sensitive data exposure
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Consecutive rejections that block a client automatically
    pub auto_block_threshold: u32,
    /// Calendar months a terminated client's contact stays blacklisted
    pub blacklist_months: u32,
    /// Upper bound for contribution listing
    pub max_list_limit: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            auto_block_threshold: 3,
            blacklist_months: 2,
            max_list_limit: 500,
        }
    }
}

impl ModerationConfig {
    /// Convert to TrustThresholds for use by ModerationEngine
    pub fn to_thresholds(&self) -> TrustThresholds {
        TrustThresholds {
            auto_block_threshold: self.auto_block_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between expiry sweeps
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook receiving notification events; log-only when unset
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/price_catalog".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                enable_auth: true,
                rate_limit_per_minute: 120,
                max_request_size: 64 * 1024, // 64KB
                api_keys: Vec::new(),
            },
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
            moderation: ModerationConfig::default(),
            sweeper: SweeperConfig {
                interval_secs: 24 * 60 * 60,
            },
            notifier: NotifierConfig {
                webhook_url: None,
                timeout_secs: 10,
                max_retries: 3,
            },
        }
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value", name))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

impl CatalogConfig {
    /// Load configuration from `CATALOG_*` environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("CATALOG_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_env("CATALOG_PORT")? {
            config.server.port = port;
        }

        // Security configuration
        if let Some(enable_auth) = parse_env("CATALOG_ENABLE_AUTH")? {
            config.security.enable_auth = enable_auth;
        }
        if let Some(rate_limit) = parse_env("CATALOG_RATE_LIMIT_PER_MINUTE")? {
            config.security.rate_limit_per_minute = rate_limit;
        }
        if let Some(size) = parse_env("CATALOG_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = size;
        }
        let primary = env::var("CATALOG_API_KEY").unwrap_or_default();
        let extra = env::var("CATALOG_API_KEYS").unwrap_or_default();
        config.security.api_keys = parse_api_keys(&primary, &extra);

        // Database configuration
        if let Ok(url) = env::var("CATALOG_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Some(enabled) = parse_env("CATALOG_POSTGRES_ENABLED")? {
            config.database.postgres_enabled = enabled;
        }
        if let Some(max) = parse_env("CATALOG_POSTGRES_MAX_CONNECTIONS")? {
            config.database.max_connections = max;
        }

        // Logging configuration
        if let Ok(log_level) = env::var("CATALOG_LOG_LEVEL") {
            config.logging.level = log_level;
        }
        if let Some(sanitize_logs) = parse_env("CATALOG_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize_logs;
        }
        if let Some(log_requests) = parse_env("CATALOG_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }

        // Moderation configuration
        if let Some(threshold) = parse_env("CATALOG_AUTO_BLOCK_THRESHOLD")? {
            config.moderation.auto_block_threshold = threshold;
        }
        if let Some(months) = parse_env("CATALOG_BLACKLIST_MONTHS")? {
            config.moderation.blacklist_months = months;
        }
        if let Some(limit) = parse_env("CATALOG_MAX_LIST_LIMIT")? {
            config.moderation.max_list_limit = limit;
        }

        // Sweeper configuration
        if let Some(interval) = parse_env("CATALOG_SWEEP_INTERVAL_SECS")? {
            config.sweeper.interval_secs = interval;
        }

        // Notifier configuration
        if let Ok(url) = env::var("CATALOG_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                config.notifier.webhook_url = Some(url.trim().to_string());
            }
        }
        if let Some(timeout) = parse_env("CATALOG_WEBHOOK_TIMEOUT_SECS")? {
            config.notifier.timeout_secs = timeout;
        }
        if let Some(retries) = parse_env("CATALOG_WEBHOOK_MAX_RETRIES")? {
            config.notifier.max_retries = retries;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.rate_limit_per_minute == 0 {
            return Err(anyhow::anyhow!("Rate limit must be at least 1 request per minute"));
        }

        if self.database.postgres_enabled {
            if self.database.postgres_url.is_empty() {
                return Err(anyhow::anyhow!(
                    "PostgreSQL is enabled but CATALOG_POSTGRES_URL is empty"
                ));
            }
            if self.database.max_connections == 0 {
                return Err(anyhow::anyhow!("PostgreSQL pool size must be non-zero"));
            }
        }

        if self.moderation.auto_block_threshold == 0 {
            return Err(anyhow::anyhow!("Auto-block threshold must be at least 1"));
        }

        if self.moderation.blacklist_months == 0 {
            return Err(anyhow::anyhow!("Blacklist duration must be at least 1 month"));
        }

        if self.moderation.max_list_limit == 0 {
            return Err(anyhow::anyhow!("Maximum list limit must be non-zero"));
        }

        if self.sweeper.interval_secs == 0 {
            return Err(anyhow::anyhow!("Sweep interval must be non-zero"));
        }

        if let Some(url) = &self.notifier.webhook_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(anyhow::anyhow!(
                    "Webhook URL must be an http(s) URL: {}",
                    sanitize_for_logging(url)
                ));
            }
            if url.starts_with("http://") {
                warn!("Webhook URL is not HTTPS, notifications are sent in clear text");
            }
        }

        Ok(())
    }
}

/// Single key plus a comma-separated list, blanks and duplicates dropped
fn parse_api_keys(primary: &str, extra: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in std::iter::once(primary).chain(extra.split(',')) {
        let key = key.trim();
        if !key.is_empty() && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
    ];

    let data_lower = data.to_lowercase();
    // Connection strings with userinfo carry credentials
    let has_userinfo = data.contains("://") && data.contains('@');

    if has_userinfo || sensitive_patterns.iter().any(|p| data_lower.contains(p)) {
        let chars: Vec<char> = data.chars().collect();
        let keep = if chars.len() > 20 { 6 } else { 2.min(chars.len()) };
        let head: String = chars[..keep].iter().collect();
        let tail: String = chars[chars.len().saturating_sub(keep)..].iter().collect();
        return format!("{}***{}", head, tail);
    }

    data.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_logging() {
        // For strings <= 20 chars with sensitive pattern, show first 2 and last 2
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
        assert_eq!(
            sanitize_for_logging("postgresql://catalog:hunter2@db:5432/catalog"),
            "postgr***atalog"
        );
    }

    #[test]
    fn test_parse_api_keys() {
        assert!(parse_api_keys("", "").is_empty());
        assert_eq!(
            parse_api_keys("gw-1", " gw-2, ,gw-1 "),
            vec!["gw-1".to_string(), "gw-2".to_string()]
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.moderation.to_thresholds().auto_block_threshold, 3);
        assert_eq!(config.moderation.blacklist_months, 2);
        assert_eq!(config.sweeper.interval_secs, 86_400);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CatalogConfig::default();
        config.moderation.auto_block_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = CatalogConfig::default();
        config.notifier.webhook_url = Some("ftp://hooks.example.com".to_string());
        assert!(config.validate().is_err());

        let mut config = CatalogConfig::default();
        config.notifier.webhook_url = Some("https://hooks.example.com/catalog".to_string());
        assert!(config.validate().is_ok());
    }
}
