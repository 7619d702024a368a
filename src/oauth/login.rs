//! Usage: Interactive login orchestrator.
//!
//! One call runs one attempt end to end: validate options, refuse CI, bind the loopback
//! listener, build and show the auth-site URL, optionally open a browser, then wait for the
//! correlator. The listener is closed before `login` returns, whatever the outcome.

use super::auth_url::{auth_site_url, QueryParams};
use super::callback::LoginCredential;
use super::callback_server::{bind_callback_listener, serve_callbacks};
use super::environments::ImsEnvironment;
use super::pending::{PendingLogin, DEFAULT_LOGIN_TIMEOUT};
use super::state::SessionState;
use crate::app::reporter::{LoginReporter, TerminalReporter, LOGGED_IN, LOGGING_IN};
use crate::infra::browser::{BrowserOpener, SystemBrowser};
use crate::infra::ci::{CiDetector, EnvCiDetector};
use crate::shared::error::{AppError, AppResult, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for draining in-flight callback connections after the outcome is known.
const CALLBACK_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
    pub env: ImsEnvironment,
    /// Listener port; `None` binds an ephemeral one.
    pub port: Option<u16>,
    pub timeout: Duration,
    /// `false` only prints the URL.
    pub open: bool,
    /// Browser application to open instead of the system default.
    pub browser: Option<String>,
    pub bare: bool,
    /// Routes the user through IMS logout first.
    pub force_login: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            scope: None,
            redirect_uri: None,
            env: ImsEnvironment::default(),
            port: None,
            timeout: DEFAULT_LOGIN_TIMEOUT,
            open: true,
            browser: None,
            bare: false,
            force_login: false,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LoginOptions {
    fn normalized(self) -> Self {
        Self {
            client_id: non_blank(self.client_id),
            scope: non_blank(self.scope),
            redirect_uri: non_blank(self.redirect_uri),
            browser: non_blank(self.browser),
            ..self
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.timeout.is_zero() {
            return Err(AppError::new(
                ErrorKind::InvalidConfig,
                "login timeout must be greater than zero",
            ));
        }
        if let Some(redirect_uri) = self.redirect_uri.as_deref() {
            let parsed = reqwest::Url::parse(redirect_uri).map_err(|e| {
                AppError::new(
                    ErrorKind::InvalidConfig,
                    format!("redirect_uri '{redirect_uri}' is not an absolute url: {e}"),
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::new(
                    ErrorKind::InvalidConfig,
                    format!("redirect_uri '{redirect_uri}' must use http or https"),
                ));
            }
        }
        Ok(())
    }
}

/// Collaborators of a login attempt.
#[derive(Clone)]
pub struct LoginDeps {
    pub reporter: Arc<dyn LoginReporter>,
    pub browser: Arc<dyn BrowserOpener>,
    pub ci: Arc<dyn CiDetector>,
}

impl LoginDeps {
    /// Terminal output, the system browser and CI detection from the environment.
    pub fn system() -> Self {
        Self {
            reporter: Arc::new(TerminalReporter),
            browser: Arc::new(SystemBrowser),
            ci: Arc::new(EnvCiDetector),
        }
    }
}

impl Default for LoginDeps {
    fn default() -> Self {
        Self::system()
    }
}

fn session_query(session: &SessionState) -> QueryParams {
    QueryParams::new()
        .with("id", Some(&session.id))
        .with("port", Some(session.port))
        .with("client_id", session.client_id.as_ref())
        .with("scope", session.scope.as_ref())
        .with("redirect_uri", session.redirect_uri.as_ref())
}

/// Runs one interactive login and returns the credential delivered by the login site.
pub async fn login(options: LoginOptions, deps: &LoginDeps) -> AppResult<LoginCredential> {
    let options = options.normalized();
    options.validate()?;

    if deps.ci.is_ci() {
        tracing::warn!("interactive oauth login refused in a CI environment");
        return Err(AppError::new(
            ErrorKind::CiUnsupported,
            "interactive login is not supported in a CI environment; use a server-to-server (client credentials) context instead",
        ));
    }

    let bound = bind_callback_listener(options.port).await?;
    let mut session = SessionState::new(bound.port());
    session.client_id = options.client_id.clone();
    session.scope = options.scope.clone();
    session.redirect_uri = options.redirect_uri.clone();

    let url = auth_site_url(&session_query(&session), options.env, options.force_login)?;

    let (pending, outcome) = PendingLogin::start(session.id.clone(), options.timeout);
    let server = serve_callbacks(bound, &pending, options.env)?;
    tracing::info!(
        port = server.port(),
        env = %options.env,
        timeout_secs = options.timeout.as_secs(),
        force_login = options.force_login,
        "waiting for oauth callback"
    );

    deps.reporter.login_url(&url, options.bare);
    if !options.bare {
        deps.reporter.progress_started(LOGGING_IN);
    }

    if options.open {
        if let Err(err) = deps.browser.open(&url, options.browser.as_deref()) {
            tracing::warn!("failed to open browser for oauth login: {}", err);
            if !options.bare {
                deps.reporter.progress_info(&format!(
                    "Could not open a browser ({}); visit the url above to continue",
                    err.message()
                ));
            }
        }
    } else {
        tracing::debug!("browser open disabled; waiting for the user to visit the url");
    }

    let result = outcome.wait().await;
    server.closed(CALLBACK_DRAIN_GRACE).await;
    drop(pending);

    match result {
        Ok(callback) => {
            tracing::info!(code_type = ?callback.code_type, "oauth login completed");
            if !options.bare {
                deps.reporter.progress_succeeded(LOGGED_IN);
            }
            Ok(callback.code)
        }
        Err(err) => {
            tracing::warn!(kind = %err.kind(), "oauth login failed: {}", err.message());
            if !options.bare {
                deps.reporter.progress_failed(err.message());
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_a_browser_with_the_standard_timeout() {
        let options = LoginOptions::default();
        assert!(options.open);
        assert!(!options.bare);
        assert_eq!(options.timeout, DEFAULT_LOGIN_TIMEOUT);
        assert_eq!(options.env, ImsEnvironment::Prod);
    }

    #[test]
    fn blank_values_are_dropped() {
        let options = LoginOptions {
            client_id: Some("  ".to_string()),
            scope: Some(" openid ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(options.client_id, None);
        assert_eq!(options.scope.as_deref(), Some("openid"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let options = LoginOptions {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = options.validate().expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn redirect_uri_must_be_an_http_url() {
        let relative = LoginOptions {
            redirect_uri: Some("/callback".to_string()),
            ..Default::default()
        };
        assert_eq!(
            relative.validate().expect_err("relative").kind(),
            ErrorKind::InvalidConfig
        );

        let ftp = LoginOptions {
            redirect_uri: Some("ftp://cb".to_string()),
            ..Default::default()
        };
        assert!(ftp.validate().is_err());

        let ok = LoginOptions {
            redirect_uri: Some("https://cb".to_string()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn session_query_omits_absent_values() {
        let mut session = SessionState::new(8000);
        session.client_id = Some("cid".to_string());
        let query = session_query(&session);
        let keys: Vec<&str> = query.present().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "port", "client_id"]);
    }
}
