//! Usage: Unified login error model (maps internal failures to `CODE: message` strings).

use std::sync::Arc;
use std::time::Duration;

pub type AppResult<T> = Result<T, AppError>;

/// Stable classification of every way a login attempt can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required login parameters are absent. Raised before any network or UI action.
    MissingConfig,
    /// A configuration value is present but unusable (e.g. unknown environment).
    InvalidConfig,
    /// Interactive login attempted from a CI job.
    CiUnsupported,
    /// No valid callback arrived within the configured window.
    Timeout,
    /// A callback arrived but could not be accepted: its `state.id` did not match the session,
    /// the code was missing, or an `access_token` payload was malformed.
    StateMismatch,
    /// The identity provider signalled an error.
    ProviderError,
    /// Listener bind failure, unreadable callback body, or a failed HTTP round-trip.
    TransportError,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingConfig => "MISSING_CONFIG",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::CiUnsupported => "CI_UNSUPPORTED",
            Self::Timeout => "TIMEOUT",
            Self::StateMismatch => "STATE_MISMATCH",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "MISSING_CONFIG" => Self::MissingConfig,
            "INVALID_CONFIG" => Self::InvalidConfig,
            "CI_UNSUPPORTED" => Self::CiUnsupported,
            "TIMEOUT" => Self::Timeout,
            "STATE_MISMATCH" => Self::StateMismatch,
            "PROVIDER_ERROR" => Self::ProviderError,
            "TRANSPORT_ERROR" => Self::TransportError,
            "INTERNAL_ERROR" => Self::Internal,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    provider_code: Option<String>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_code: None,
            source: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error code reported by the identity provider, when it sent one.
    pub fn provider_code(&self) -> Option<&str> {
        self.provider_code.as_deref()
    }

    /// True when a callback reached the listener but was refused.
    pub fn is_callback_rejection(&self) -> bool {
        matches!(self.kind, ErrorKind::StateMismatch | ErrorKind::ProviderError)
    }

    pub(crate) fn missing_properties(missing: &[&str]) -> Self {
        Self::new(
            ErrorKind::MissingConfig,
            format!(
                "OAuth2 not supported due to some missing properties: {}",
                missing.join(",")
            ),
        )
    }

    pub(crate) fn timed_out(after: Duration) -> Self {
        let seconds = if after.subsec_nanos() == 0 {
            after.as_secs().to_string()
        } else {
            format!("{:.1}", after.as_secs_f64())
        };
        Self::new(
            ErrorKind::Timeout,
            format!("Timed out after {seconds} seconds."),
        )
    }
}

fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let msg = raw.trim();
    let msg = msg.strip_prefix("Error:").unwrap_or(msg).trim();
    if msg.is_empty() {
        return None;
    }

    let (maybe_code, rest) = msg.split_once(':')?;
    let code = maybe_code.trim();
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
        return None;
    }
    Some((code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        if let Some((code, rest)) = split_code_message(&value) {
            if let Some(kind) = ErrorKind::from_code(code) {
                let message = if rest.is_empty() { value.trim() } else { rest };
                return AppError::new(kind, message.to_string());
            }
        }
        AppError::new(ErrorKind::Internal, value)
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
