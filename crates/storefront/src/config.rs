//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `BACKEND_API_URL` - Base URL of the store REST backend (e.g. `https://api.stride-shoes.example/api/`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `BACKEND_MAX_RETRIES` - Retries for idempotent GETs (default: 3)
//! - `BACKEND_RETRY_BASE_MS` - First backoff delay (default: 250)
//! - `ACCESS_TOKEN_TTL_SECS` - Access token lifetime when the token carries no `exp` (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Upper bound for the backoff delay between retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(4);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// REST backend configuration
    pub backend: BackendConfig,
    /// Fallback access token lifetime
    pub access_token_ttl: Duration,
    /// Error tracking configuration
    pub sentry: SentryConfig,
}

/// REST backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, always ending in `/` so relative paths join beneath it
    pub api_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Number of retries for idempotent requests
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    pub retry_base_delay: Duration,
    /// Backoff cap
    pub retry_max_delay: Duration,
}

/// Sentry error tracking settings.
///
/// Implements `Debug` manually to redact the DSN.
#[derive(Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<SecretString>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
    }
}

impl StorefrontConfig {
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.parse_or("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parse_or("STOREFRONT_PORT", "3000")?;
        let base_url = env.required("STOREFRONT_BASE_URL")?;
        let backend = BackendConfig::from_env(&env)?;
        let access_token_ttl = Duration::from_secs(env.parse_or("ACCESS_TOKEN_TTL_SECS", "300")?);
        let sentry = SentryConfig {
            dsn: env.optional("SENTRY_DSN").map(SecretString::from),
            environment: env.optional("SENTRY_ENVIRONMENT"),
            sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            access_token_ttl,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env<F>(env: &Env<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = env.required("BACKEND_API_URL")?;
        let api_url = parse_base_url(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_API_URL".to_string(), e))?;

        Ok(Self {
            api_url,
            timeout: Duration::from_secs(env.parse_or("BACKEND_TIMEOUT_SECS", "15")?),
            max_retries: env.parse_or("BACKEND_MAX_RETRIES", "3")?,
            retry_base_delay: Duration::from_millis(env.parse_or("BACKEND_RETRY_BASE_MS", "250")?),
            retry_max_delay: MAX_RETRY_DELAY,
        })
    }

    /// Configuration for a backend at `api_url` with default timings.
    ///
    /// # Errors
    ///
    /// Returns an error message if the URL is not an absolute http(s) URL.
    pub fn with_defaults(api_url: &str) -> Result<Self, String> {
        Ok(Self {
            api_url: parse_base_url(api_url)?,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: MAX_RETRY_DELAY,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL and make sure it ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    Ok(url)
}

/// Typed access to a variable source.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("STOREFRONT_BASE_URL", "https://stride-shoes.example"),
        ("BACKEND_API_URL", "https://api.stride-shoes.example/api"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.backend.max_retries, 3);
        assert_eq!(config.backend.timeout, Duration::from_secs(15));
        assert_eq!(config.access_token_ttl, Duration::from_secs(300));
        assert!(config.sentry.dsn.is_none());
        assert!(config.is_secure());
    }

    #[test]
    fn test_backend_url_gets_trailing_slash() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(
            config.backend.api_url.as_str(),
            "https://api.stride-shoes.example/api/"
        );
        assert_eq!(
            config.backend.api_url.join("cart/items/").unwrap().as_str(),
            "https://api.stride-shoes.example/api/cart/items/"
        );
    }

    #[test]
    fn test_missing_backend_url() {
        let err = load(&[("STOREFRONT_BASE_URL", "http://localhost:3000")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "BACKEND_API_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("STOREFRONT_PORT", "eighty"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "STOREFRONT_PORT"));
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let err = load(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("BACKEND_API_URL", "ftp://files.example"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_sentry_debug_redacts_dsn() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SENTRY_DSN", "https://public-key@o0.ingest.sentry.io/42"));
        let config = load(&vars).unwrap();
        let debug_output = format!("{:?}", config.sentry);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("public-key"));
    }
}
