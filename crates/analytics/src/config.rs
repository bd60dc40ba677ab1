//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PENDO_INTEGRATION_KEY` - Pendo integration key (sent as `x-pendo-integration-key`)
//!
//! ## Optional
//! - `PENDO_API_BASE` - API base URL (default: <https://app.pendo.io>)
//! - `PENDO_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)
//! - `PENDO_MAX_RETRIES` - Retries for rate-limited/server errors (default: 1, 0 disables)
//! - `PENDO_FANOUT_LIMIT` - Max per-item queries per tool call (default: 10, range 1-25)
//! - `PENDO_CACHE_TTL_SECS` - Entity catalog cache TTL in seconds (default: 300)
//! - `PENDO_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_API_BASE: &str = "https://app.pendo.io";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 1;
const MAX_RETRIES_CEILING: u32 = 5;
pub const DEFAULT_FANOUT_LIMIT: usize = 10;
const MAX_FANOUT_LIMIT: usize = 25;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "integration-key",
    "xxx",
    "todo",
    "insert",
    "enter-",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format for the CLI subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Process-wide configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct InsightsConfig {
    /// Pendo API configuration
    pub pendo: PendoConfig,
    /// Maximum number of per-item queries a single tool call may issue
    pub fanout_limit: usize,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

/// Pendo API configuration.
///
/// Implements `Debug` manually to redact the integration key.
#[derive(Clone)]
pub struct PendoConfig {
    /// Integration key
    pub integration_key: SecretString,
    /// API base URL
    pub api_base: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for transient failures
    pub max_retries: u32,
    /// TTL for cached entity catalogs
    pub cache_ttl: Duration,
}

impl std::fmt::Debug for PendoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendoConfig")
            .field("integration_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl InsightsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the integration key is missing or looks like a
    /// placeholder, or if an optional variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let pendo = PendoConfig::from_env()?;
        let fanout_limit = parse_bounded(
            "PENDO_FANOUT_LIMIT",
            get_optional_env("PENDO_FANOUT_LIMIT").as_deref(),
            DEFAULT_FANOUT_LIMIT,
            1,
            MAX_FANOUT_LIMIT,
        )?;
        let log_format = parse_log_format(&get_env_or_default("PENDO_LOG_FORMAT", "text"))?;
        let sentry_dsn = get_optional_env("SENTRY_DSN").filter(|s| !s.trim().is_empty());
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            pendo,
            fanout_limit,
            log_format,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
        })
    }

    /// Returns a reference to the Pendo configuration.
    #[must_use]
    pub const fn pendo(&self) -> &PendoConfig {
        &self.pendo
    }
}

impl PendoConfig {
    /// Configuration with default timeout, retry and cache settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_base` is not a valid URL.
    pub fn new(integration_key: SecretString, api_base: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            integration_key,
            api_base: parse_base_url("PENDO_API_BASE", api_base)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let integration_key = get_validated_secret("PENDO_INTEGRATION_KEY")?;
        let api_base = parse_base_url(
            "PENDO_API_BASE",
            &get_env_or_default("PENDO_API_BASE", DEFAULT_API_BASE),
        )?;
        let timeout_secs = parse_bounded(
            "PENDO_TIMEOUT_SECS",
            get_optional_env("PENDO_TIMEOUT_SECS").as_deref(),
            DEFAULT_TIMEOUT_SECS,
            1,
            300,
        )?;
        let max_retries = parse_bounded(
            "PENDO_MAX_RETRIES",
            get_optional_env("PENDO_MAX_RETRIES").as_deref(),
            DEFAULT_MAX_RETRIES,
            0,
            MAX_RETRIES_CEILING,
        )?;
        let cache_ttl_secs = parse_bounded(
            "PENDO_CACHE_TTL_SECS",
            get_optional_env("PENDO_CACHE_TTL_SECS").as_deref(),
            DEFAULT_CACHE_TTL_SECS,
            0,
            86_400,
        )?;

        Ok(Self {
            integration_key,
            api_base,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }

    /// The integration key header value.
    #[must_use]
    pub fn integration_key(&self) -> &str {
        self.integration_key.expose_secret()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional numeric value, enforcing inclusive bounds.
fn parse_bounded<T>(key: &str, raw: Option<&str>, default: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    let value = raw
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value < min || value > max {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between {min} and {max} (got {value})"),
        ));
    }
    Ok(value)
}

fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(with_trailing_slash(url))
}

/// Treat the base URL as a directory so relative joins keep any path prefix.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_log_format(raw: &str) -> Result<LogFormat, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar(
            "PENDO_LOG_FORMAT".to_string(),
            format!("expected 'text' or 'json' (got '{other}')"),
        )),
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(value.trim(), key)?;
    Ok(SecretString::from(value.trim().to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_uuid_shaped_key_passes() {
        let result =
            validate_secret_strength("3f1c9a7e-52b4-4d0e-9b8a-6c2f71e0d4a5", "PENDO_INTEGRATION_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let err =
            validate_secret_strength("your-integration-key-here", "PENDO_INTEGRATION_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_low_entropy_key_rejected() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "PENDO_INTEGRATION_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_parse_bounded() {
        assert_eq!(parse_bounded("K", None, 10_usize, 1, 25).unwrap(), 10);
        assert_eq!(parse_bounded("K", Some(" 4 "), 10_usize, 1, 25).unwrap(), 4);
        assert!(parse_bounded("K", Some("0"), 10_usize, 1, 25).is_err());
        assert!(parse_bounded("K", Some("26"), 10_usize, 1, 25).is_err());
        assert!(matches!(
            parse_bounded("K", Some("ten"), 10_usize, 1, 25),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("K", "https://app.eu.pendo.io").is_ok());
        assert!(parse_base_url("K", "ftp://app.pendo.io").is_err());
        assert!(parse_base_url("K", "not a url").is_err());
        assert_eq!(
            parse_base_url("K", "https://proxy.internal/pendo").unwrap().as_str(),
            "https://proxy.internal/pendo/"
        );
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormat::Json);
        assert_eq!(parse_log_format("text").unwrap(), LogFormat::Text);
        assert!(parse_log_format("yaml").is_err());
    }

    #[test]
    fn test_pendo_config_debug_redacts_key() {
        let config = PendoConfig::new(
            SecretString::from("3f1c9a7e-52b4-4d0e-9b8a-6c2f71e0d4a5"),
            DEFAULT_API_BASE,
        )
        .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("3f1c9a7e"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 1);
    }
}
