//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCKBOT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ENCRYPTION_KEY` - Base64-encoded 32-byte field encryption key
//! - `ADMIN_USERNAME` - Admin panel login name
//! - `ADMIN_PASSWORD` - Admin panel password
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `WEBHOOK_SECRET` - Expected `X-Telegram-Bot-Api-Secret-Token` value.
//!   Unset or empty disables webhook authentication.
//! - `STOCKBOT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOCKBOT_PORT` - Listen port (default: 8000)
//! - `STOCKBOT_BASE_URL` - Public URL (default: <http://localhost:8000>)
//! - `FALLBACK_ADMIN_IDS` - Comma-separated Telegram user ids treated as admins
//!   when they have no row in `users`
//! - `SETTINGS_PATH` - JSON file holding the item rules edited from the admin panel
//! - `ALLOWED_TYPES`, `MIN_LEN_STR`, `MAX_LEN_STR`, `MAX_ITEM_AMOUNT`,
//!   `MAX_ITEM_PRICE`, `SKIP_WORKING_HOURS` - Item rule defaults
//! - `WORKING_HOURS_TZ` - IANA time zone for the working-hours check (default: Europe/Lisbon)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `STOCKBOT_TLS_CERT` - PEM-encoded certificate chain
//! - `STOCKBOT_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use stockbot_core::{CodecError, FieldCipher, ItemRules, TelegramUserId};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const DEFAULT_WORKING_HOURS_ZONE: Tz = Tz::Europe__Lisbon;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Invalid ENCRYPTION_KEY: {0}")]
    InvalidEncryptionKey(#[from] CodecError),
}

/// Server configuration.
///
/// Loaded once at startup and shared read-only. The item rules here are only
/// the initial values; runtime edits go through `SettingsStore`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: Url,
    /// Field cipher built from `ENCRYPTION_KEY`
    pub cipher: FieldCipher,
    /// Webhook secret; `None` means authentication is skipped
    pub webhook_secret: Option<SecretString>,
    /// Admin panel credentials and session secret
    pub admin: AdminConfig,
    /// Telegram ids treated as admins when absent from the database
    pub fallback_admin_ids: Vec<TelegramUserId>,
    /// Where admin-edited item rules are persisted
    pub settings_path: Option<PathBuf>,
    /// Initial item rules
    pub item_rules: ItemRules,
    /// Zone whose wall clock the working-hours check uses
    pub working_hours_zone: Tz,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Single administrator identity for the admin panel.
///
/// Implements `Debug` manually to redact the password and session secret.
#[derive(Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: SecretString,
    pub session_secret: SecretString,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .finish()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

/// Environment accessor. `from_env` reads the process environment; tests
/// pass a map.
struct Env<F: Fn(&str) -> Option<String>> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }

    /// Database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// if the encryption key is malformed, or if secrets fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let database_url = env.database_url("STOCKBOT_DATABASE_URL")?;

        // The key guards every stored ciphertext: refuse to start without it.
        let cipher = FieldCipher::from_base64(&env.required("ENCRYPTION_KEY")?)?;

        let host = env
            .or_default("STOCKBOT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOCKBOT_HOST".to_string(), e.to_string()))?;
        let port = env.parsed::<u16>("STOCKBOT_PORT")?.unwrap_or(8000);
        let base_url = Url::parse(&env.or_default("STOCKBOT_BASE_URL", "http://localhost:8000"))
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOCKBOT_BASE_URL".to_string(), e.to_string())
            })?;

        let webhook_secret = env.optional("WEBHOOK_SECRET").map(SecretString::from);

        let admin = AdminConfig {
            username: env.required("ADMIN_USERNAME")?,
            password: SecretString::from(env.required("ADMIN_PASSWORD")?),
            session_secret: env.validated_secret("ADMIN_SESSION_SECRET")?,
        };
        validate_session_secret(&admin.session_secret, "ADMIN_SESSION_SECRET")?;

        let fallback_admin_ids = env
            .optional("FALLBACK_ADMIN_IDS")
            .map(|raw| parse_id_list(&raw))
            .transpose()?
            .unwrap_or_default();

        let item_rules = item_rules_from(&env)?;

        let working_hours_zone = env
            .parsed::<Tz>("WORKING_HOURS_TZ")?
            .unwrap_or(DEFAULT_WORKING_HOURS_ZONE);

        let tls = match (env.optional("STOCKBOT_TLS_CERT"), env.optional("STOCKBOT_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "STOCKBOT_TLS_*".to_string(),
                    "Both STOCKBOT_TLS_CERT and STOCKBOT_TLS_KEY must be set together"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cipher,
            webhook_secret,
            admin,
            fallback_admin_ids,
            settings_path: env.optional("SETTINGS_PATH").map(PathBuf::from),
            item_rules,
            working_hours_zone,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parsed("SENTRY_SAMPLE_RATE")?.unwrap_or(1.0),
            sentry_traces_sample_rate: env.parsed("SENTRY_TRACES_SAMPLE_RATE")?.unwrap_or(1.0),
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a comma-separated list of Telegram user ids.
fn parse_id_list(raw: &str) -> Result<Vec<TelegramUserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<TelegramUserId>().map_err(|e| {
                ConfigError::InvalidEnvVar("FALLBACK_ADMIN_IDS".to_string(), format!("{s}: {e}"))
            })
        })
        .collect()
}

/// Build the initial item rules from environment overrides.
fn item_rules_from<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<ItemRules, ConfigError> {
    let defaults = ItemRules::default();

    let allowed_types = match env.optional("ALLOWED_TYPES") {
        Some(raw) if raw.trim_start().starts_with('[') => serde_json::from_str::<Vec<String>>(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("ALLOWED_TYPES".to_string(), e.to_string()))?,
        Some(raw) => raw.split(',').map(str::to_owned).collect(),
        None => defaults.allowed_types,
    };

    let rules = ItemRules {
        allowed_types,
        min_len_str: env.parsed("MIN_LEN_STR")?.unwrap_or(defaults.min_len_str),
        max_len_str: env.parsed("MAX_LEN_STR")?.unwrap_or(defaults.max_len_str),
        max_item_amount: env
            .parsed("MAX_ITEM_AMOUNT")?
            .unwrap_or(defaults.max_item_amount),
        max_item_price: env
            .parsed::<Decimal>("MAX_ITEM_PRICE")?
            .unwrap_or(defaults.max_item_price),
        skip_working_hours: env
            .parsed("SKIP_WORKING_HOURS")?
            .unwrap_or(defaults.skip_working_hours),
    }
    .normalized();

    rules
        .validate()
        .map_err(|e| ConfigError::InvalidEnvVar("item rules".to_string(), e.to_string()))?;
    Ok(rules)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` naming `var_name` if the secret is
/// short, contains a placeholder pattern, or has low entropy.
pub fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
