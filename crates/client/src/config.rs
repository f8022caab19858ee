//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `POCKET_SHOP_API_URL` - Backend base URL (default: `http://127.0.0.1:3000`)
//! - `POCKET_SHOP_CATALOG_URL` - Catalog base URL (default: `https://fakestoreapi.com`)
//! - `POCKET_SHOP_TOKEN` - Bearer token to restore a signed-in session
//! - `SENTRY_DSN` - Sentry error tracking DSN

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_CATALOG_URL: &str = "https://fakestoreapi.com";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL for cart, order and user endpoints.
    pub api_url: Url,
    /// Catalog base URL for product lookups.
    pub catalog_url: Url,
    /// Bearer token restored from the environment, if any.
    pub token: Option<SecretString>,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = get_url_or_default("POCKET_SHOP_API_URL", DEFAULT_API_URL)?;
        let catalog_url = get_url_or_default("POCKET_SHOP_CATALOG_URL", DEFAULT_CATALOG_URL)?;
        let token = get_optional_env("POCKET_SHOP_TOKEN").and_then(|v| token_from_value(&v));
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            catalog_url,
            token,
            sentry_dsn,
        })
    }

    /// Configuration pointing both the backend and the catalog at `base`.
    ///
    /// Used by tests and local tooling that serve everything from one host.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base` is not a valid URL.
    pub fn for_base_url(base: &str) -> Result<Self, ConfigError> {
        let url = parse_base_url("base_url", base)?;
        Ok(Self {
            api_url: url.clone(),
            catalog_url: url,
            token: None,
            sentry_dsn: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get a URL from the environment with a default value.
fn get_url_or_default(key: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = get_optional_env(key).unwrap_or_else(|| default.to_string());
    parse_base_url(key, &raw)
}

/// Parse a base URL, making sure relative joins keep its path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Wrap a token value, treating a blank value as signed out.
///
/// The token is opaque: whatever the auth service issued is passed through.
fn token_from_value(raw: &str) -> Option<SecretString> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| SecretString::from(trimmed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_means_signed_out() {
        assert!(token_from_value("").is_none());
        assert!(token_from_value("   \n").is_none());
    }

    #[test]
    fn test_issued_token_passes_through_verbatim() {
        use secrecy::ExposeSecret;

        // Base64 text can contain any letter run, so nothing is pattern-matched
        for raw in [
            "eyJhbGciOiJIUzI1NiJ9.eyJpZCI6NDJ9.Qm9vZ2xxxV29vZ2llMTIz",
            "eyJhbGciOiJIUzI1NiJ9.eyJpZCI6NDJ9.TodoZ2llV29vZ2ll",
            "abc.def.ghi12",
        ] {
            let token = token_from_value(raw).unwrap();
            assert_eq!(token.expose_secret(), raw);
        }
    }

    #[test]
    fn test_token_is_trimmed() {
        use secrecy::ExposeSecret;

        let token = token_from_value("  tok-7Hq2xLm9Pz4vKc8R\n").unwrap();
        assert_eq!(token.expose_secret(), "tok-7Hq2xLm9Pz4vKc8R");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("K", "http://localhost:3000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/");
        assert_eq!(
            url.join("cart").unwrap().as_str(),
            "http://localhost:3000/api/cart"
        );
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        assert!(parse_base_url("K", "ftp://localhost").is_err());
        assert!(parse_base_url("K", "not a url").is_err());
    }

    #[test]
    fn test_for_base_url() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:4000").unwrap();
        assert_eq!(config.api_url, config.catalog_url);
        assert!(config.token.is_none());
    }
}
