//! Usage: IMS context configuration (TOML file) consumed by the login flow registry.

use crate::oauth::environments::ImsEnvironment;
use crate::oauth::pending::DEFAULT_LOGIN_TIMEOUT;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CLI_BARE_OUTPUT_KEY: &str = "cli.bare-output";

/// Loose, all-optional login configuration. Which keys are present decides the login flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImsContextConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_secrets: Option<Vec<String>>,
    pub scope: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub callback_url: Option<String>,
    pub redirect_uri: Option<String>,
    pub technical_account_email: Option<String>,
    pub technical_account_id: Option<String>,
    pub ims_org_id: Option<String>,
    pub env: Option<String>,
    /// Login timeout in seconds.
    pub timeout: Option<u64>,
    pub port: Option<u16>,
    pub open: Option<bool>,
    pub browser: Option<String>,
    pub force: Option<bool>,
    #[serde(rename = "cli.bare-output", alias = "$cli.bare-output")]
    pub cli_bare_output: Option<bool>,
}

impl ImsContextConfig {
    pub fn parse(raw: &str) -> AppResult<Self> {
        toml::from_str(raw).map_err(|e| {
            AppError::new(
                ErrorKind::InvalidConfig,
                format!("ims context config is not valid toml: {e}"),
            )
        })
    }

    /// True when `key` is set to a usable value (non-blank string, non-empty list).
    pub fn is_present(&self, key: &str) -> bool {
        fn text(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        fn list(v: &Option<Vec<String>>) -> bool {
            v.as_deref()
                .is_some_and(|items| items.iter().any(|s| !s.trim().is_empty()))
        }

        match key {
            "client_id" => text(&self.client_id),
            "client_secret" => text(&self.client_secret),
            "client_secrets" => list(&self.client_secrets),
            "scope" => text(&self.scope),
            "scopes" => list(&self.scopes),
            "callback_url" => text(&self.callback_url),
            "redirect_uri" => text(&self.redirect_uri),
            "technical_account_email" => text(&self.technical_account_email),
            "technical_account_id" => text(&self.technical_account_id),
            "ims_org_id" => text(&self.ims_org_id),
            "env" => text(&self.env),
            "timeout" => self.timeout.is_some(),
            "port" => self.port.is_some(),
            "open" => self.open.is_some(),
            "browser" => text(&self.browser),
            "force" => self.force.is_some(),
            CLI_BARE_OUTPUT_KEY => self.cli_bare_output.is_some(),
            _ => false,
        }
    }

    pub fn environment(&self) -> AppResult<ImsEnvironment> {
        ImsEnvironment::resolve(self.env.as_deref())
    }

    /// Configured timeout; absent or zero falls back to the default.
    pub fn login_timeout(&self) -> Duration {
        match self.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_LOGIN_TIMEOUT,
        }
    }
}

pub fn load(path: &Path) -> AppResult<ImsContextConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::new(
                ErrorKind::MissingConfig,
                format!("ims context config not found: {}", path.display()),
            ));
        }
        Err(err) => {
            return Err(format!(
                "INVALID_CONFIG: failed to read {}: {err}",
                path.display()
            )
            .into());
        }
    };
    let config = ImsContextConfig::parse(&raw)?;
    tracing::debug!(path = %path.display(), "ims context config loaded");
    Ok(config)
}
