//! Usage: Build the provider-facing auth-site URL (optionally routed through IMS logout).

use super::environments::ImsEnvironment;
use crate::shared::error::AppResult;

/// Ordered query parameters; `None` values are dropped when the URL is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Option<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: Option<impl ToString>) {
        self.entries.push((key.into(), value.map(|v| v.to_string())));
    }

    /// Entries with a value, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }
}

/// Builds the auth-site URL for `env`.
///
/// With `force_login` the result is the IMS logout URL whose `redirect_uri` points at the
/// normal auth-site URL, so the user signs out before being sent into the login flow.
pub fn auth_site_url(
    params: &QueryParams,
    env: ImsEnvironment,
    force_login: bool,
) -> AppResult<String> {
    let endpoints = env.endpoints();
    let mut url = reqwest::Url::parse(endpoints.login_site_url)
        .map_err(|e| format!("INVALID_CONFIG: invalid login site url: {e}"))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params.present() {
            query.append_pair(key, value);
        }
    }
    let auth_url = strip_empty_query(url);

    if !force_login {
        return Ok(auth_url);
    }

    let mut logout = reqwest::Url::parse(endpoints.logout_url)
        .map_err(|e| format!("INVALID_CONFIG: invalid logout url: {e}"))?;
    logout
        .query_pairs_mut()
        .append_pair("redirect_uri", &auth_url);
    Ok(logout.to_string())
}

// `query_pairs_mut` leaves a dangling `?` when nothing was appended.
fn strip_empty_query(mut url: reqwest::Url) -> String {
    if url.query() == Some("") {
        url.set_query(None);
    }
    url.to_string()
}
