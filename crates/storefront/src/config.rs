//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `SUPABASE_URL` - Hosted data/auth service URL (e.g., <https://xyz.supabase.co>)
//! - `SUPABASE_ANON_KEY` - Public API key; row-level security does the rest
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_AUTH_URL` - External sign-in page (default: `{SUPABASE_URL}/auth/v1/authorize`)
//! - `STOREFRONT_AUTH_PROVIDER` - Identity provider offered there (default: google)
//! - `STOREFRONT_CURRENCY` - ISO currency code for prices (default: VND)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use luxury_jewelry_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_AUTH_PROVIDER: &str = "google";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
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

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
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
    /// Hosted data and auth service configuration
    pub supabase: SupabaseConfig,
    /// Currency every product price is expressed in
    pub currency: CurrencyCode,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Hosted data/auth service configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL (REST lives under `/rest/v1`, auth under `/auth/v1`)
    pub url: Url,
    /// API key sent with every request (anon key for the storefront)
    pub api_key: SecretString,
    /// External authentication entry point shoppers are sent to
    pub auth_url: Url,
    /// Identity provider the entry point signs shoppers in with
    pub auth_provider: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("auth_url", &self.auth_url.as_str())
            .field("auth_provider", &self.auth_provider)
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
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let currency = get_env_or_default("STOREFRONT_CURRENCY", "VND")
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_CURRENCY".to_string(), e.to_string())
            })?;
        let log_format = parse_log_format(get_optional_env("LOG_FORMAT").as_deref());

        let supabase = SupabaseConfig::from_env_with_key("SUPABASE_ANON_KEY")?;

        Ok(Self {
            host,
            port,
            base_url,
            supabase,
            currency,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
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

    /// Where the external sign-in page should send shoppers back to.
    #[must_use]
    pub fn auth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url)
    }
}

impl SupabaseConfig {
    /// Load the service URL and the API key stored in `key_var`.
    ///
    /// The storefront uses the anon key; management tools pass the
    /// service-role key variable instead.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing, a URL is invalid, or
    /// the key looks like a placeholder.
    pub fn from_env_with_key(key_var: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let url = parse_url("SUPABASE_URL", &get_required_env("SUPABASE_URL")?)?;
        let api_key = get_validated_secret(key_var)?;
        let auth_url = match get_optional_env("STOREFRONT_AUTH_URL") {
            Some(raw) => Url::parse(raw.trim()).map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_AUTH_URL".to_string(), e.to_string())
            })?,
            None => url.join("auth/v1/authorize").map_err(|e| {
                ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e.to_string())
            })?,
        };

        let auth_provider = get_env_or_default("STOREFRONT_AUTH_PROVIDER", DEFAULT_AUTH_PROVIDER)
            .trim()
            .to_ascii_lowercase();
        if auth_provider.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_AUTH_PROVIDER".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            url,
            api_key,
            auth_url,
            auth_provider,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an absolute URL, normalising it to end with `/` so `join` appends.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut normalised = raw.trim().to_string();
    if !normalised.ends_with('/') {
        normalised.push('/');
    }
    Url::parse(&normalised).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_log_format(raw: Option<&str>) -> LogFormat {
    match raw {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Text,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real keys are JWTs or random tokens)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the project settings."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            supabase: SupabaseConfig {
                url: Url::parse("https://project.supabase.co/").unwrap(),
                api_key: SecretString::from("super_secret_anon_key_value"),
                auth_url: Url::parse("https://project.supabase.co/auth/v1/authorize").unwrap(),
                auth_provider: "google".to_string(),
            },
            currency: CurrencyCode::VND,
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-anon-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_jwt_like() {
        let result = validate_secret_strength(
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJyb2xlIjoiYW5vbiJ9.Zk3q9vX2",
            "TEST_VAR",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_url_appends_trailing_slash() {
        let url = parse_url("X", "https://project.supabase.co").unwrap();
        assert_eq!(url.as_str(), "https://project.supabase.co/");
        assert_eq!(
            url.join("rest/v1/").unwrap().as_str(),
            "https://project.supabase.co/rest/v1/"
        );
        assert!(parse_url("X", "not a url").is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format(Some("JSON")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("pretty")), LogFormat::Text);
        assert_eq!(parse_log_format(None), LogFormat::Text);
    }

    #[test]
    fn test_socket_addr_and_callback() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());
        assert_eq!(config.auth_callback_url(), "http://localhost:3000/auth/callback");
    }

    #[test]
    fn test_supabase_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config().supabase);
        assert!(debug_output.contains("project.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_anon_key_value"));
    }
}
