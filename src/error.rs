//! Error types for phishsim.

/// Top-level error type for the simulation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures talking to the mail provider or the classification endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{service} request failed: {reason}")]
    Network { service: String, reason: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Authentication failed for {service}: {reason}")]
    AuthFailed { service: String, reason: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Invalid request to {service}: {reason}")]
    InvalidRequest { service: String, reason: String },
}

impl TransportError {
    pub fn network(service: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            service: service.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn invalid_response(service: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Intent classification errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Reply text was empty after markup and whitespace normalization.
    #[error("Reply text is empty after normalization")]
    InvalidInput,

    /// Retry budget exhausted without a usable label.
    #[error("Classification failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// State store and event log errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Target {email} cannot move from {from} to {to}")]
    InvalidTransition {
        email: String,
        from: String,
        to: String,
    },

    #[error("Target {0} already has an intent")]
    IntentAlreadySet(String),
}

/// Result type alias for the simulation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_only_for_http_failures() {
        let err = TransportError::Status {
            service: "zoho".into(),
            status: 401,
            body: "INVALID_OAUTHTOKEN".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(TransportError::network("zoho", "timed out").status(), None);
    }

    #[test]
    fn top_level_error_wraps_sources() {
        let err: Error = ClassifierError::InvalidInput.into();
        assert!(err.to_string().contains("empty after normalization"));

        let err: Error = StoreError::UnknownTarget("a@x.com".into()).into();
        assert_eq!(err.to_string(), "State store error: Unknown target: a@x.com");
    }
}
