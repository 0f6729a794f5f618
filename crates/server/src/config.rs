//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Store
//! - `LARDER_STORE` - `postgres` (default) or `memory`
//! - `LARDER_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; required unless `LARDER_STORE=memory`)
//!
//! ## Server
//! - `LARDER_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` / `LARDER_PORT` - Listen port (default: 3001)
//! - `LARDER_MAX_PAGE_SIZE` - Largest accepted search `limit` (default: 100)
//! - `LARDER_RECIPE_CACHE_TTL_SECS` - Recipe lookup cache TTL, 0 disables (default: 30)
//!
//! ## Error tracking (server and CLI)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - optional
//!
//! ## Backfill
//! - `SPOONACULAR_KEY` - Provider API key (falls back to `VITE_SPOONACULAR_KEY`)
//! - `SPOONACULAR_BASE_URL` - Provider base URL (default: <https://api.spoonacular.com>)
//! - `BACKFILL_PAGE_SIZE` (100), `BACKFILL_BATCH_SIZE` (50),
//!   `BACKFILL_SAFETY_CAP` (10000), `BACKFILL_PAGE_DELAY_MS` (1000)

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::backfill::BackfillSettings;

pub const DEFAULT_SPOONACULAR_BASE_URL: &str = "https://api.spoonacular.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Reads one variable; `std::env::var` in production, a map in tests.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// =============================================================================
// Store
// =============================================================================

/// Which recipe store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}' (expected postgres or memory)")),
        }
    }
}

/// Recipe store connection settings.
#[derive(Clone, Default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Present whenever `backend` is `Postgres`.
    pub database_url: Option<SecretString>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl StoreConfig {
    /// An in-memory store; nothing to connect to.
    #[must_use]
    pub const fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
        }
    }

    /// Load store settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the backend name is unknown or the Postgres
    /// backend is selected without a database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let backend = get_env_or_default(env, "LARDER_STORE", "postgres")
            .parse::<StoreBackend>()
            .map_err(|e| ConfigError::InvalidEnvVar("LARDER_STORE".to_string(), e))?;

        let database_url = match backend {
            StoreBackend::Postgres => Some(get_database_url(env, "LARDER_DATABASE_URL")?),
            StoreBackend::Memory => None,
        };

        Ok(Self {
            backend,
            database_url,
        })
    }
}

// =============================================================================
// Error tracking
// =============================================================================

/// Sentry settings shared by the server and the CLI.
///
/// Sentry stays off unless `SENTRY_DSN` is set. Unparseable sample rates fall
/// back to `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 1.0,
        }
    }
}

impl SentryConfig {
    /// Load Sentry settings from the environment. Never fails.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Self {
        let rate = |key: &str| env(key).and_then(|s| s.trim().parse().ok()).unwrap_or(1.0);

        Self {
            dsn: env("SENTRY_DSN").filter(|s| !s.trim().is_empty()),
            environment: env("SENTRY_ENVIRONMENT"),
            sample_rate: rate("SENTRY_SAMPLE_RATE"),
            traces_sample_rate: rate("SENTRY_TRACES_SAMPLE_RATE"),
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Largest `limit` a search request may ask for
    pub max_page_size: usize,
    /// How long looked-up recipes stay cached; zero disables the cache
    pub recipe_cache_ttl: Duration,
    pub sentry: SentryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::memory(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            max_page_size: 100,
            recipe_cache_ttl: Duration::from_secs(30),
            sentry: SentryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let store = StoreConfig::from_lookup(env)?;
        let host = parse_env(env, "LARDER_HOST", "127.0.0.1")?;

        // PORT is what most hosting platforms inject
        let port = match env("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?,
            None => parse_env(env, "LARDER_PORT", "3001")?,
        };

        let max_page_size: usize = parse_env(env, "LARDER_MAX_PAGE_SIZE", "100")?;
        if max_page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LARDER_MAX_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let recipe_cache_ttl =
            Duration::from_secs(parse_env(env, "LARDER_RECIPE_CACHE_TTL_SECS", "30")?);

        Ok(Self {
            store,
            host,
            port,
            max_page_size,
            recipe_cache_ttl,
            sentry: SentryConfig::from_lookup(env),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Backfill
// =============================================================================

/// Spoonacular API access.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SpoonacularConfig {
    pub api_key: SecretString,
    pub base_url: Url,
}

impl fmt::Debug for SpoonacularConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpoonacularConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl SpoonacularConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let (key_name, api_key) = match env("SPOONACULAR_KEY") {
            Some(value) => ("SPOONACULAR_KEY", value),
            None => match env("VITE_SPOONACULAR_KEY") {
                Some(value) => ("VITE_SPOONACULAR_KEY", value),
                None => return Err(ConfigError::MissingEnvVar("SPOONACULAR_KEY".to_string())),
            },
        };
        let api_key = api_key.trim().to_string();
        validate_api_key(&api_key, key_name)?;

        let base_url = get_env_or_default(env, "SPOONACULAR_BASE_URL", DEFAULT_SPOONACULAR_BASE_URL);
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SPOONACULAR_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
        })
    }
}

/// Everything the backfill command needs.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub store: StoreConfig,
    pub spoonacular: SpoonacularConfig,
    pub settings: BackfillSettings,
}

impl BackfillConfig {
    /// Load backfill configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API key is missing or looks like a
    /// placeholder, or if a numeric setting cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let store = StoreConfig::from_lookup(env)?;
        let spoonacular = SpoonacularConfig::from_lookup(env)?;

        let defaults = BackfillSettings::default();
        let settings = BackfillSettings {
            page_size: parse_env(env, "BACKFILL_PAGE_SIZE", &defaults.page_size.to_string())?,
            batch_size: parse_env(env, "BACKFILL_BATCH_SIZE", &defaults.batch_size.to_string())?,
            safety_cap: parse_env(env, "BACKFILL_SAFETY_CAP", &defaults.safety_cap.to_string())?,
            page_delay: Duration::from_millis(parse_env(
                env,
                "BACKFILL_PAGE_DELAY_MS",
                &defaults.page_delay.as_millis().to_string(),
            )?),
        };
        settings
            .validate()
            .map_err(|e| ConfigError::InvalidEnvVar("BACKFILL_*".to_string(), e))?;

        Ok(Self {
            store,
            spoonacular,
            settings,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(env: Lookup<'_>, primary_key: &str) -> Result<SecretString, ConfigError> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: Lookup<'_>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(env: Lookup<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Reject provider keys that are blank, contain whitespace, or are
/// placeholders copied from an example `.env`.
///
/// Provider keys are random hex, so no entropy threshold is applied.
fn validate_api_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InsecureSecret(var_name.to_string(), reason);

    if key.is_empty() {
        return Err(invalid("is empty".to_string()));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace".to_string()));
    }

    let lower = key.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(invalid(format!(
            "appears to be a placeholder (contains '{pattern}')"
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const GOOD_KEY: &str = "4f9c1a7be2d84k0qz6m3x5t8w1r2y7u9";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_validate_api_key_placeholder() {
        let result = validate_api_key("your-api-key-here", "SPOONACULAR_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(..))));
    }

    #[test]
    fn test_validate_api_key_format() {
        assert!(validate_api_key("", "SPOONACULAR_KEY").is_err());
        assert!(validate_api_key("0ac414f5 c500bd6c", "SPOONACULAR_KEY").is_err());
        assert!(validate_api_key(GOOD_KEY, "SPOONACULAR_KEY").is_ok());
    }

    #[test]
    fn test_low_entropy_hex_key_is_accepted() {
        // real-looking provider key with repeated digits
        let env = lookup(&[
            ("LARDER_STORE", "memory"),
            ("SPOONACULAR_KEY", "0ac414f5c500bd6cdaf5ac6860aa8a5f"),
        ]);
        let config = BackfillConfig::from_lookup(&env).unwrap();
        assert_eq!(
            config.spoonacular.api_key.expose_secret(),
            "0ac414f5c500bd6cdaf5ac6860aa8a5f"
        );
    }

    #[test]
    fn test_api_key_is_trimmed() {
        let env = lookup(&[("LARDER_STORE", "memory"), ("SPOONACULAR_KEY", " abc123def456\n")]);
        let config = BackfillConfig::from_lookup(&env).unwrap();
        assert_eq!(config.spoonacular.api_key.expose_secret(), "abc123def456");
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert_eq!(" memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_store_config_requires_database_url_for_postgres() {
        let env = lookup(&[]);
        let result = StoreConfig::from_lookup(&env);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(key)) if key == "LARDER_DATABASE_URL"));
    }

    #[test]
    fn test_store_config_falls_back_to_database_url() {
        let env = lookup(&[("DATABASE_URL", "postgres://localhost/larder")]);
        let config = StoreConfig::from_lookup(&env).unwrap();
        assert_eq!(config.backend, StoreBackend::Postgres);
        assert!(config.database_url.is_some());
    }

    #[test]
    fn test_store_config_memory_needs_no_url() {
        let env = lookup(&[("LARDER_STORE", "memory")]);
        let config = StoreConfig::from_lookup(&env).unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_server_config_defaults() {
        let env = lookup(&[("LARDER_STORE", "memory")]);
        let config = ServerConfig::from_lookup(&env).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.recipe_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.sentry, SentryConfig::default());
    }

    #[test]
    fn test_server_config_port_prefers_platform_port() {
        let env = lookup(&[
            ("LARDER_STORE", "memory"),
            ("PORT", "8080"),
            ("LARDER_PORT", "9090"),
        ]);
        let config = ServerConfig::from_lookup(&env).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_server_config_cache_ttl_can_be_disabled() {
        let env = lookup(&[
            ("LARDER_STORE", "memory"),
            ("LARDER_RECIPE_CACHE_TTL_SECS", "0"),
        ]);
        let config = ServerConfig::from_lookup(&env).unwrap();
        assert!(config.recipe_cache_ttl.is_zero());
    }

    #[test]
    fn test_server_config_rejects_bad_values() {
        let env = lookup(&[("LARDER_STORE", "memory"), ("LARDER_PORT", "lots")]);
        assert!(matches!(
            ServerConfig::from_lookup(&env),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "LARDER_PORT"
        ));

        let env = lookup(&[("LARDER_STORE", "memory"), ("LARDER_MAX_PAGE_SIZE", "0")]);
        assert!(ServerConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn test_backfill_config_key_fallback() {
        let env = lookup(&[("LARDER_STORE", "memory"), ("VITE_SPOONACULAR_KEY", GOOD_KEY)]);
        let config = BackfillConfig::from_lookup(&env).unwrap();
        assert_eq!(config.spoonacular.base_url.as_str(), "https://api.spoonacular.com/");
        assert_eq!(config.settings, BackfillSettings::default());
    }

    #[test]
    fn test_backfill_config_requires_key() {
        let env = lookup(&[("LARDER_STORE", "memory")]);
        assert!(matches!(
            BackfillConfig::from_lookup(&env),
            Err(ConfigError::MissingEnvVar(key)) if key == "SPOONACULAR_KEY"
        ));
    }

    #[test]
    fn test_sentry_config_from_env() {
        let env = lookup(&[
            ("SENTRY_DSN", "https://key@sentry.example/1"),
            ("SENTRY_ENVIRONMENT", "staging"),
            ("SENTRY_TRACES_SAMPLE_RATE", "0.25"),
            ("SENTRY_SAMPLE_RATE", "lots"),
        ]);
        let config = SentryConfig::from_lookup(&env);
        assert_eq!(config.dsn.as_deref(), Some("https://key@sentry.example/1"));
        assert_eq!(config.environment.as_deref(), Some("staging"));
        assert!((config.traces_sample_rate - 0.25).abs() < f32::EPSILON);
        assert!((config.sample_rate - 1.0).abs() < f32::EPSILON);

        let blank = SentryConfig::from_lookup(&lookup(&[("SENTRY_DSN", "  ")]));
        assert!(blank.dsn.is_none());
    }

    #[test]
    fn test_backfill_config_overrides() {
        let env = lookup(&[
            ("LARDER_STORE", "memory"),
            ("SPOONACULAR_KEY", GOOD_KEY),
            ("BACKFILL_PAGE_SIZE", "25"),
            ("BACKFILL_PAGE_DELAY_MS", "0"),
        ]);
        let config = BackfillConfig::from_lookup(&env).unwrap();
        assert_eq!(config.settings.page_size, 25);
        assert_eq!(config.settings.page_delay, Duration::ZERO);
    }

    #[test]
    fn test_spoonacular_config_debug_redacts_key() {
        let config = SpoonacularConfig {
            api_key: SecretString::from(GOOD_KEY),
            base_url: Url::parse(DEFAULT_SPOONACULAR_BASE_URL).unwrap(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(GOOD_KEY));
    }

    #[test]
    fn test_store_config_debug_redacts_url() {
        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            database_url: Some(SecretString::from("postgres://user:hunter2@db/larder")),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
