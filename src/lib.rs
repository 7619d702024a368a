mod app;
mod infra;
mod oauth;
mod shared;
pub mod test_support;

pub use app::logging::{init as init_logging, LOG_ENV_VAR};
pub use app::reporter::{
    LoginReporter, SilentReporter, TerminalReporter, LOGGED_IN, LOGGING_IN, VISIT_URL_PROMPT,
};
pub use infra::browser::{BrowserOpener, SystemBrowser};
pub use infra::ci::{CiDetector, EnvCiDetector, StaticCi};
pub use infra::config::{load as load_config, ImsContextConfig, CLI_BARE_OUTPUT_KEY};
pub use oauth::auth_url::{auth_site_url, QueryParams};
pub use oauth::callback::{AccessToken, CallbackResult, CodeType, LoginCredential};
pub use oauth::callback_server::{
    bind_callback_listener, serve_callbacks, BoundCallbackListener, CallbackServer,
    ALLOWED_METHODS,
};
pub use oauth::environments::{ImsEndpoints, ImsEnvironment, ENV_VAR as IMS_ENV_VAR};
pub use oauth::flows::{
    ims_login, missing_keys, supports, susi_url, BrowserRedirectFlow, CliHostedFlow, FlowDeps,
    FlowKind, LoginFlow, LoginResult, ServerToServerFlow, WebAuthenticator,
};
pub use oauth::login::{login, LoginDeps, LoginOptions};
pub use oauth::pending::{LoginPhase, PendingLogin, PendingOutcome, DEFAULT_LOGIN_TIMEOUT};
pub use oauth::state::{random_id, EchoedState, SessionState};
pub use oauth::token_exchange::{
    AuthorizationCodeGrant, ClientCredentialsGrant, HttpImsClient, ImsClient, ImsToken,
};
pub use oauth::BoxFuture;
pub use shared::error::{AppError, AppResult, ErrorKind};
