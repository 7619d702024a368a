//! Usage: IMS token endpoint client (authorization_code + client_credentials grants).

use super::environments::ImsEnvironment;
use super::BoxFuture;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::security::mask_secret;
use crate::shared::time::now_unix_millis;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentialsGrant {
    pub client_id: String,
    pub client_secret: String,
    pub org_id: String,
    pub scopes: Vec<String>,
}

/// Token returned by IMS. `expiry` is an absolute unix timestamp in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImsToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

/// Exchanges credentials with IMS.
///
/// Object-safe so flows can take `&dyn ImsClient`.
pub trait ImsClient: Send + Sync {
    fn exchange_authorization_code<'a>(
        &'a self,
        grant: &'a AuthorizationCodeGrant,
    ) -> BoxFuture<'a, AppResult<ImsToken>>;

    fn exchange_client_credentials<'a>(
        &'a self,
        grant: &'a ClientCredentialsGrant,
    ) -> BoxFuture<'a, AppResult<ImsToken>>;
}

#[derive(Debug, Clone)]
pub struct HttpImsClient {
    client: reqwest::Client,
    token_url: String,
}

impl HttpImsClient {
    pub fn for_environment(env: ImsEnvironment) -> AppResult<Self> {
        Self::with_token_url(env.endpoints().token_url)
    }

    pub fn with_token_url(token_url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("TRANSPORT_ERROR: failed to build ims http client: {e}"))?;
        Ok(Self {
            client,
            token_url: token_url.into(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn post_grant(
        &self,
        grant_type: &str,
        form: HashMap<&str, String>,
    ) -> AppResult<ImsToken> {
        tracing::debug!(
            grant_type,
            token_url = %self.token_url,
            "requesting ims token"
        );
        let response = self
            .client
            .post(self.token_url.trim())
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("TRANSPORT_ERROR: ims token request failed: {e}"))?;

        parse_token_response(response).await
    }
}

impl ImsClient for HttpImsClient {
    fn exchange_authorization_code<'a>(
        &'a self,
        grant: &'a AuthorizationCodeGrant,
    ) -> BoxFuture<'a, AppResult<ImsToken>> {
        Box::pin(async move {
            let mut form: HashMap<&str, String> = HashMap::new();
            form.insert("grant_type", "authorization_code".to_string());
            form.insert("code", grant.code.trim().to_string());
            form.insert("client_id", grant.client_id.trim().to_string());
            form.insert("client_secret", grant.client_secret.trim().to_string());
            if !grant.scope.trim().is_empty() {
                form.insert("scope", grant.scope.trim().to_string());
            }
            self.post_grant("authorization_code", form).await
        })
    }

    fn exchange_client_credentials<'a>(
        &'a self,
        grant: &'a ClientCredentialsGrant,
    ) -> BoxFuture<'a, AppResult<ImsToken>> {
        Box::pin(async move {
            let mut form: HashMap<&str, String> = HashMap::new();
            form.insert("grant_type", "client_credentials".to_string());
            form.insert("client_id", grant.client_id.trim().to_string());
            form.insert("client_secret", grant.client_secret.trim().to_string());
            form.insert("org_id", grant.org_id.trim().to_string());
            form.insert("scope", join_scopes(&grant.scopes));
            self.post_grant("client_credentials", form).await
        })
    }
}

fn join_scopes(scopes: &[String]) -> String {
    scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

async fn parse_token_response(response: reqwest::Response) -> AppResult<ImsToken> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("TRANSPORT_ERROR: ims token response read failed: {e}"))?;

    if !status.is_success() {
        let (error_code, error_message) = parse_ims_error_details(&body);
        let snippet = sanitize_error_body_snippet(&body);
        let mut msg = format!("ims token endpoint returned status={}", status.as_u16());
        if let Some(code) = error_code.as_deref() {
            msg.push_str(" code=");
            msg.push_str(code);
        }
        if let Some(detail) = error_message {
            msg.push_str(" message=");
            msg.push_str(detail.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(snippet.as_str());

        tracing::warn!(status = status.as_u16(), "ims token request rejected");
        let err = AppError::new(ErrorKind::ProviderError, msg);
        return Err(match error_code {
            Some(code) => err.with_provider_code(code),
            None => err,
        });
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| format!("PROVIDER_ERROR: ims token response json invalid: {e}"))?;
    token_from_value(&value, now_unix_millis())
}

fn token_from_value(value: &Value, now_ms: i64) -> AppResult<ImsToken> {
    let string_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let access_token = string_field("access_token")
        .ok_or_else(|| "PROVIDER_ERROR: ims token response missing access_token".to_string())?;

    let expiry = value
        .get("expires_in")
        .and_then(parse_i64_lossy)
        .filter(|secs| *secs > 0)
        .map(|secs| now_ms.saturating_add(secs.saturating_mul(1000)));

    Ok(ImsToken {
        access_token,
        token_type: string_field("token_type"),
        refresh_token: string_field("refresh_token"),
        expiry,
    })
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token") || key_lc.contains("secret") || key_lc == "authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_secret(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

fn sanitize_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(ERROR_SNIPPET_CHARS).collect();
        }
    }
    body.chars().take(ERROR_SNIPPET_CHARS).collect()
}

/// Extracts `(error code, description)` from an IMS error body.
///
/// IMS answers `{"error":"invalid_client","error_description":"..."}`; nested
/// `{"error":{"code":..,"message":..}}` bodies are accepted too.
fn parse_ims_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut code = None;
    let mut message = non_empty(value.get("error_description"));

    match value.get("error") {
        Some(err @ Value::String(_)) => code = non_empty(Some(err)),
        Some(Value::Object(err_obj)) => {
            code = non_empty(err_obj.get("code")).or_else(|| non_empty(err_obj.get("type")));
            if message.is_none() {
                message = non_empty(err_obj.get("message"));
            }
        }
        _ => {}
    }
    if code.is_none() {
        code = non_empty(value.get("code"));
    }

    (code, message)
}
