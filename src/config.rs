//! Configuration types.
//!
//! Everything is read once at process start and handed to component
//! constructors. Nothing below this module reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default reminder budget before a target is given up on.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Zoho Mail account and OAuth client settings.
#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub account_id: String,
    /// Address initial messages and follow-ups are sent from.
    pub from_address: String,
    /// OAuth host, e.g. `https://accounts.zoho.in`.
    pub accounts_url: String,
    /// Mail API host, e.g. `https://mail.zoho.in`.
    pub mail_url: String,
    /// Page size for the unread listing.
    pub unread_limit: u32,
    pub request_timeout: Duration,
}

/// Gemini `generateContent` settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    /// Thinking tokens allowed per call; `None` leaves the model default.
    pub thinking_budget: Option<u32>,
}

/// Bounded-attempt retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Where target records are persisted.
    pub state_path: PathBuf,
    /// Where the audit event log is persisted.
    pub log_path: PathBuf,
    /// Reminders sent before a target moves to `max_retries_reached`.
    pub max_retries: u32,
    /// Landing page embedded in the worried/curious follow-up. Omitted when `None`.
    pub capture_link: Option<String>,
    /// Characters of reply text kept in a record's history.
    pub preview_chars: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("simulation_state.json"),
            log_path: PathBuf::from("simulation_log.json"),
            max_retries: DEFAULT_MAX_RETRIES,
            capture_link: None,
            preview_chars: 200,
        }
    }
}

impl SimulationConfig {
    /// Engine settings only; enough for the read-only report commands.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let defaults = Self::default();
        Ok(Self {
            state_path: get("PHISHSIM_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            log_path: get("PHISHSIM_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
            max_retries: parse_or(&get, "PHISHSIM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            capture_link: get("PHISHSIM_CAPTURE_LINK"),
            preview_chars: parse_or(&get, "PHISHSIM_PREVIEW_CHARS", defaults.preview_chars)?,
        })
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub zoho: ZohoConfig,
    pub gemini: GeminiConfig,
    pub classifier: RetryPolicy,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let timeout = Duration::from_secs(parse_or(&get, "PHISHSIM_HTTP_TIMEOUT_SECS", 10)?);

        let zoho = ZohoConfig {
            client_id: required("ZOHO_CLIENT_ID")?,
            client_secret: SecretString::from(required("ZOHO_CLIENT_SECRET")?),
            refresh_token: SecretString::from(required("ZOHO_REFRESH_TOKEN")?),
            account_id: required("ZOHO_ACCOUNT_ID")?,
            from_address: required("ZOHO_FROM_EMAIL")?,
            accounts_url: get("ZOHO_ACCOUNTS_URL")
                .unwrap_or_else(|| "https://accounts.zoho.in".to_string()),
            mail_url: get("ZOHO_MAIL_URL").unwrap_or_else(|| "https://mail.zoho.in".to_string()),
            unread_limit: parse_or(&get, "ZOHO_UNREAD_LIMIT", 50)?,
            request_timeout: timeout,
        };

        let gemini = GeminiConfig {
            api_key: SecretString::from(required("GEMINI_API_KEY")?),
            model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            request_timeout: timeout,
            thinking_budget: parse_thinking_budget(get("GEMINI_THINKING_BUDGET"))?,
        };

        let classifier = RetryPolicy {
            max_attempts: parse_or(&get, "CLASSIFIER_MAX_ATTEMPTS", 3)?,
            backoff: Duration::from_secs(parse_or(&get, "CLASSIFIER_BACKOFF_SECS", 2)?),
        };
        if classifier.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLASSIFIER_MAX_ATTEMPTS".into(),
                message: "must be at least 1".into(),
            });
        }

        let simulation = SimulationConfig::from_lookup(&lookup)?;

        Ok(Self {
            zoho,
            gemini,
            classifier,
            simulation,
        })
    }
}

/// Default 0. `none` omits the setting for models without thinking support.
fn parse_thinking_budget(raw: Option<String>) -> Result<Option<u32>, ConfigError> {
    match raw.as_deref() {
        None => Ok(Some(0)),
        Some(v) if v.eq_ignore_ascii_case("none") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: "GEMINI_THINKING_BUDGET".into(),
                message: format!("{v:?}: {e}"),
            }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}
