//! Token lifecycle configuration.
//!
//! The configuration is an immutable value handed to the
//! [`Provider`](crate::oauth::Provider) at construction time. Nothing in
//! this crate reads process-wide settings.
//!
//! # Example (TOML)
//!
//! ```toml
//! request_timeout = "5s"
//!
//! [oauth]
//! global_secret = "a-very-long-secret-of-at-least-32-bytes"
//! access_token_lifetime = "1h"
//! refresh_token_lifetime = "24h"   # or "never"
//! refresh_token_grace_period = "0s"
//!
//! [internal_client]
//! client_id = "mycarehub"
//! client_secret = "..."
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minimum length of the HMAC key used to sign opaque tokens.
pub const MIN_GLOBAL_SECRET_LEN: usize = 32;

/// Upper bound for every token lifetime and the refresh grace period.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Root configuration for the token subsystem.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Deadline applied to every provider operation. `None` disables it.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Token lifetimes and signing secret.
    pub oauth: OAuthConfig,

    /// First-party client used by [`TokenService`](crate::token::TokenService).
    pub internal_client: Option<InternalClientConfig>,
}

/// OAuth 2.0 token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// HMAC key for token signatures.
    pub global_secret: Secret,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime; `"never"` issues non-expiring refresh tokens.
    pub refresh_token_lifetime: Lifespan,

    /// When non-zero, a rotated refresh token stays usable for this long
    /// instead of being deactivated immediately.
    #[serde(with = "humantime_serde")]
    pub refresh_token_grace_period: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            global_secret: Secret::default(),
            access_token_lifetime: Duration::from_secs(3600), // 1 hour
            refresh_token_lifetime: Lifespan::Finite(Duration::from_secs(24 * 3600)),
            refresh_token_grace_period: Duration::ZERO,
        }
    }
}

/// Credentials of the first-party client that mints tokens for signed-in users.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InternalClientConfig {
    /// Client ID registered in the client store.
    pub client_id: String,

    /// Plaintext secret, verified against the stored hash on refresh.
    pub client_secret: Secret,
}

/// Token lifetime that may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifespan {
    /// Expires after the given duration.
    Finite(Duration),
    /// Never expires.
    Never,
}

impl Lifespan {
    /// Returns the duration, or `None` for [`Lifespan::Never`].
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Finite(d) => Some(*d),
            Self::Never => None,
        }
    }
}

impl Serialize for Lifespan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(d) => humantime_serde::serialize(d, serializer),
            Self::Never => serializer.serialize_str("never"),
        }
    }
}

impl<'de> Deserialize<'de> for Lifespan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "never" | "-1" => Ok(Self::Never),
            value => {
                let de: StrDeserializer<'_, D::Error> = value.into_deserializer();
                humantime_serde::deserialize(de).map(Self::Finite)
            }
        }
    }
}

/// String that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a plaintext secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no secret was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Configuration validation and loading errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing secret is missing or too short, or
    /// a lifetime is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.global_secret.is_empty() {
            return Err(ConfigError::Missing("oauth.global_secret".to_string()));
        }

        if self.oauth.global_secret.expose().len() < MIN_GLOBAL_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "oauth.global_secret must be at least {} bytes",
                MIN_GLOBAL_SECRET_LEN
            )));
        }

        if self.oauth.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oauth.access_token_lifetime must be > 0".to_string(),
            ));
        }

        if let Lifespan::Finite(d) = self.oauth.refresh_token_lifetime
            && d.is_zero()
        {
            return Err(ConfigError::InvalidValue(
                "oauth.refresh_token_lifetime must be > 0 or \"never\"".to_string(),
            ));
        }

        let bounded = [
            ("oauth.access_token_lifetime", Some(self.oauth.access_token_lifetime)),
            (
                "oauth.refresh_token_lifetime",
                self.oauth.refresh_token_lifetime.as_duration(),
            ),
            (
                "oauth.refresh_token_grace_period",
                Some(self.oauth.refresh_token_grace_period),
            ),
        ];
        for (name, value) in bounded {
            if value.is_some_and(|d| d > MAX_TOKEN_LIFETIME) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must not exceed {}",
                    humantime_serde::re::humantime::format_duration(MAX_TOKEN_LIFETIME)
                )));
            }
        }

        if let Some(timeout) = self.request_timeout
            && timeout.is_zero()
        {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        if let Some(ref client) = self.internal_client
            && client.client_id.is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "internal_client.client_id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

pub mod loader {
    use super::{AuthConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Environment variable prefix, e.g. `CAREHUB_AUTH__OAUTH__GLOBAL_SECRET`.
    pub const ENV_PREFIX: &str = "CAREHUB_AUTH";

    /// Loads the configuration from an optional TOML file plus environment
    /// overrides, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be merged or the result is invalid.
    pub fn load_config(path: Option<&str>) -> Result<AuthConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(p) = path {
            let pathbuf = PathBuf::from(p);
            if pathbuf.exists() {
                builder = builder.add_source(File::from(pathbuf));
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AuthConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
