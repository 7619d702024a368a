//! Usage: Local interactive IMS OAuth2 login (session state, auth-site URL, loopback callback
//! listener, correlator, orchestrator) plus the flow registry and token exchange client.

pub(crate) mod auth_url;
pub(crate) mod callback;
pub(crate) mod callback_server;
pub(crate) mod environments;
pub(crate) mod flows;
pub(crate) mod login;
pub(crate) mod pending;
pub(crate) mod state;
pub(crate) mod token_exchange;

pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
