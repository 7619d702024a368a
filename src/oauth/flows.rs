//! Usage: Login flow registry: pick a typed flow from a loose `ImsContextConfig` and run it.
//!
//! Flows are tried in order (server-to-server, browser redirect, CLI hosted); the first one whose
//! required keys are all present wins.

use super::callback::LoginCredential;
use super::environments::ImsEnvironment;
use super::login::{login, LoginDeps, LoginOptions};
use super::token_exchange::{AuthorizationCodeGrant, ClientCredentialsGrant, ImsClient, ImsToken};
use super::BoxFuture;
use crate::infra::config::{ImsContextConfig, CLI_BARE_OUTPUT_KEY};
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::time::now_unix_millis;
use serde::Serialize;

const BROWSER_REDIRECT_STATE_PREFIX: &str = "oauth-imslogin-";

/// Embedded browser window (or similar) that drives a provider login page to completion.
pub trait WebAuthenticator: Send + Sync {
    /// Shows `url` and resolves with the authorization code once the provider redirects back.
    fn launch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<String>>;

    /// Tears the window down. Called after a failed attempt.
    fn terminate(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    ServerToServer,
    BrowserRedirect,
    CliHosted,
}

impl FlowKind {
    /// Selection order.
    pub const ALL: [FlowKind; 3] = [
        FlowKind::ServerToServer,
        FlowKind::BrowserRedirect,
        FlowKind::CliHosted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerToServer => "server_to_server",
            Self::BrowserRedirect => "browser_redirect",
            Self::CliHosted => "cli_hosted",
        }
    }

    pub const fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::ServerToServer => &[
                "client_id",
                "client_secrets",
                "technical_account_email",
                "technical_account_id",
                "scopes",
                "ims_org_id",
            ],
            Self::BrowserRedirect => &["callback_url", "client_id", "client_secret", "scope"],
            Self::CliHosted => &[CLI_BARE_OUTPUT_KEY],
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn missing_keys(kind: FlowKind, config: &ImsContextConfig) -> Vec<&'static str> {
    kind.required_keys()
        .iter()
        .copied()
        .filter(|key| !config.is_present(key))
        .collect()
}

pub fn supports(kind: FlowKind, config: &ImsContextConfig) -> bool {
    missing_keys(kind, config).is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToServerFlow {
    pub client_id: String,
    pub client_secret: String,
    pub technical_account_email: String,
    pub technical_account_id: String,
    pub scopes: Vec<String>,
    pub ims_org_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserRedirectFlow {
    pub callback_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub env: ImsEnvironment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliHostedFlow {
    pub options: LoginOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFlow {
    ServerToServer(ServerToServerFlow),
    BrowserRedirect(BrowserRedirectFlow),
    CliHosted(CliHostedFlow),
}

/// What a flow produced: an IMS token, or the raw credential of a CLI-hosted login.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoginResult {
    Token(ImsToken),
    Credential(LoginCredential),
}

/// Collaborators a flow may need. `web` is only required by the browser redirect flow.
#[derive(Clone, Copy)]
pub struct FlowDeps<'a> {
    pub login: &'a LoginDeps,
    pub ims: &'a dyn ImsClient,
    pub web: Option<&'a dyn WebAuthenticator>,
}

fn required_text(config_value: &Option<String>) -> String {
    config_value.as_deref().unwrap_or_default().trim().to_string()
}

fn non_blank_items(values: &Option<Vec<String>>) -> Vec<String> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl LoginFlow {
    pub fn kind(&self) -> FlowKind {
        match self {
            Self::ServerToServer(_) => FlowKind::ServerToServer,
            Self::BrowserRedirect(_) => FlowKind::BrowserRedirect,
            Self::CliHosted(_) => FlowKind::CliHosted,
        }
    }

    /// Builds the `kind` flow; fails with `MISSING_CONFIG` naming the absent keys.
    pub fn from_config(kind: FlowKind, config: &ImsContextConfig) -> AppResult<Self> {
        let missing = missing_keys(kind, config);
        if !missing.is_empty() {
            return Err(AppError::missing_properties(&missing));
        }

        Ok(match kind {
            FlowKind::ServerToServer => Self::ServerToServer(ServerToServerFlow {
                client_id: required_text(&config.client_id),
                client_secret: non_blank_items(&config.client_secrets)
                    .into_iter()
                    .next()
                    .unwrap_or_default(),
                technical_account_email: required_text(&config.technical_account_email),
                technical_account_id: required_text(&config.technical_account_id),
                scopes: non_blank_items(&config.scopes),
                ims_org_id: required_text(&config.ims_org_id),
            }),
            FlowKind::BrowserRedirect => Self::BrowserRedirect(BrowserRedirectFlow {
                callback_url: required_text(&config.callback_url),
                client_id: required_text(&config.client_id),
                client_secret: required_text(&config.client_secret),
                scope: required_text(&config.scope),
                env: config.environment()?,
            }),
            FlowKind::CliHosted => Self::CliHosted(CliHostedFlow {
                options: LoginOptions {
                    client_id: config.client_id.clone(),
                    scope: config.scope.clone(),
                    redirect_uri: config.redirect_uri.clone(),
                    env: config.environment()?,
                    port: config.port,
                    timeout: config.login_timeout(),
                    open: config.open.unwrap_or(true),
                    browser: config.browser.clone(),
                    bare: config.cli_bare_output.unwrap_or(false),
                    force_login: config.force.unwrap_or(false),
                },
            }),
        })
    }

    /// First flow (in `FlowKind::ALL` order) the config fully supports.
    pub fn select(config: &ImsContextConfig) -> AppResult<Self> {
        let mut report = Vec::with_capacity(FlowKind::ALL.len());
        for kind in FlowKind::ALL {
            let missing = missing_keys(kind, config);
            if missing.is_empty() {
                tracing::debug!(flow = %kind, "ims login flow selected");
                return Self::from_config(kind, config);
            }
            tracing::debug!(flow = %kind, missing = ?missing, "ims login flow not supported");
            report.push(format!("{kind}[{}]", missing.join(",")));
        }
        Err(AppError::new(
            ErrorKind::MissingConfig,
            format!(
                "OAuth2 not supported due to some missing properties: {}",
                report.join("; ")
            ),
        ))
    }

    pub async fn run(&self, deps: FlowDeps<'_>) -> AppResult<LoginResult> {
        match self {
            Self::ServerToServer(flow) => {
                let grant = ClientCredentialsGrant {
                    client_id: flow.client_id.clone(),
                    client_secret: flow.client_secret.clone(),
                    org_id: flow.ims_org_id.clone(),
                    scopes: flow.scopes.clone(),
                };
                tracing::info!(
                    client_id = %flow.client_id,
                    technical_account_id = %flow.technical_account_id,
                    "ims server-to-server login"
                );
                let token = deps.ims.exchange_client_credentials(&grant).await?;
                Ok(LoginResult::Token(token))
            }
            Self::BrowserRedirect(flow) => run_browser_redirect(flow, deps).await,
            Self::CliHosted(flow) => {
                let credential = login(flow.options.clone(), deps.login).await?;
                Ok(LoginResult::Credential(credential))
            }
        }
    }
}

/// IMS authorize ("SUSI") URL for the browser redirect flow.
pub fn susi_url(
    env: ImsEnvironment,
    client_id: &str,
    scope: &str,
    callback_url: &str,
    state: &str,
) -> AppResult<String> {
    let mut url = reqwest::Url::parse(env.endpoints().authorize_url)
        .map_err(|e| format!("INVALID_CONFIG: invalid ims authorize url: {e}"))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("scope", scope)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", callback_url)
        .append_pair("state", state);
    Ok(url.to_string())
}

async fn run_browser_redirect(
    flow: &BrowserRedirectFlow,
    deps: FlowDeps<'_>,
) -> AppResult<LoginResult> {
    let web = deps.web.ok_or_else(|| {
        AppError::new(
            ErrorKind::InvalidConfig,
            "browser redirect login needs a web authenticator",
        )
    })?;

    let state = format!("{BROWSER_REDIRECT_STATE_PREFIX}{}", now_unix_millis());
    let url = susi_url(
        flow.env,
        &flow.client_id,
        &flow.scope,
        &flow.callback_url,
        &state,
    )?;
    tracing::info!(client_id = %flow.client_id, env = %flow.env, "ims browser redirect login");

    let code = match web.launch(&url).await {
        Ok(code) => code,
        Err(err) => {
            web.terminate();
            return Err(err);
        }
    };

    let grant = AuthorizationCodeGrant {
        code,
        client_id: flow.client_id.clone(),
        client_secret: flow.client_secret.clone(),
        scope: flow.scope.clone(),
    };
    match deps.ims.exchange_authorization_code(&grant).await {
        Ok(token) => Ok(LoginResult::Token(token)),
        Err(err) => {
            web.terminate();
            Err(err)
        }
    }
}

/// Selects the flow for `config` and runs it.
pub async fn ims_login(config: &ImsContextConfig, deps: FlowDeps<'_>) -> AppResult<LoginResult> {
    let flow = LoginFlow::select(config)?;
    flow.run(deps).await
}
