//! Usage: Interpret callback parameters (code, code_type, state) into a login credential.

use super::state::EchoedState;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::security::{mask_secret, session_ids_match};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the `code` callback parameter must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    #[default]
    AuthCode,
    AccessToken,
}

impl CodeType {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("access_token") => Self::AccessToken,
            _ => Self::AuthCode,
        }
    }
}

/// Access token delivered directly by the login site (`code_type=access_token`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What a successful login yields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoginCredential {
    AuthorizationCode(String),
    AccessToken(AccessToken),
}

impl LoginCredential {
    pub fn as_authorization_code(&self) -> Option<&str> {
        match self {
            Self::AuthorizationCode(code) => Some(code),
            Self::AccessToken(_) => None,
        }
    }

    pub fn as_access_token(&self) -> Option<&AccessToken> {
        match self {
            Self::AuthorizationCode(_) => None,
            Self::AccessToken(token) => Some(token),
        }
    }
}

/// A callback that matched the pending session.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResult {
    pub code: LoginCredential,
    pub code_type: CodeType,
    pub state: EchoedState,
}

/// Raw callback parameters, from the query string (GET) or the form body (POST).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CallbackParams {
    pub(crate) code: Option<String>,
    pub(crate) code_type: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

impl CallbackParams {
    pub(crate) fn from_map(mut map: HashMap<String, String>) -> Self {
        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_empty());
        Self {
            code: take("code"),
            code_type: take("code_type"),
            state: take("state"),
            error: take("error"),
            error_description: take("error_description"),
        }
    }
}

/// Turns the raw `code` into a credential according to `code_type`.
pub(crate) fn code_transform(code: &str, code_type: CodeType) -> AppResult<LoginCredential> {
    match code_type {
        CodeType::AuthCode => Ok(LoginCredential::AuthorizationCode(code.to_string())),
        CodeType::AccessToken => serde_json::from_str::<AccessToken>(code)
            .map(LoginCredential::AccessToken)
            .map_err(|e| {
                AppError::new(
                    ErrorKind::StateMismatch,
                    format!("oauth callback access token is malformed: {e}"),
                )
            }),
    }
}

/// Validates a callback against the expected session id.
///
/// Never panics on bad input: a missing or malformed `state` simply fails the id check.
pub(crate) fn evaluate_callback(
    params: &CallbackParams,
    expected_id: &str,
) -> AppResult<CallbackResult> {
    if let Some(provider_error) = params.error.as_deref() {
        let description = params
            .error_description
            .as_deref()
            .unwrap_or("oauth login failed");
        return Err(AppError::new(
            ErrorKind::ProviderError,
            format!("oauth provider returned error={provider_error}: {description}"),
        )
        .with_provider_code(provider_error));
    }

    let state = EchoedState::parse_lossy(params.state.as_deref());
    let raw_code = params.code.as_deref();

    let Some(code) = raw_code.filter(|_| session_ids_match(expected_id, state.id.as_deref()))
    else {
        tracing::warn!(
            echoed_id = state.id.as_deref().unwrap_or("<none>"),
            has_code = raw_code.is_some(),
            "oauth callback rejected: state mismatch"
        );
        let shown = raw_code.unwrap_or("undefined");
        return Err(AppError::new(
            ErrorKind::StateMismatch,
            format!("error code={shown}"),
        ));
    };

    let code_type = CodeType::parse(params.code_type.as_deref());
    let credential = code_transform(code, code_type)?;
    tracing::debug!(
        code = %mask_secret(code),
        code_type = ?code_type,
        "oauth callback accepted"
    );

    Ok(CallbackResult {
        code: credential,
        code_type,
        state,
    })
}
