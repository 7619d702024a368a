//! Usage: Loopback HTTP listener that receives the login site's callback (GET redirect or POST).
//!
//! The listener only ever talks to one `PendingLogin`. OPTIONS and unsupported methods are
//! answered without touching it; GET/POST callbacks are evaluated and delivered. The listener
//! shuts down gracefully as soon as the pending login reaches a terminal phase.

use super::callback::{evaluate_callback, CallbackParams};
use super::environments::{ImsEndpoints, ImsEnvironment};
use super::pending::PendingLogin;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const ALLOWED_METHODS: &str = "OPTIONS, GET, POST";
const LOOPBACK_HOSTS: [&str; 2] = ["127.0.0.1", "::1"];
const MAX_CALLBACK_BODY_BYTES: usize = 64 * 1024;
const POST_PROTOCOL_VERSION: u8 = 2;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug)]
pub struct BoundCallbackListener {
    port: u16,
    listener: TcpListener,
}

impl BoundCallbackListener {
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Binds the loopback callback listener.
///
/// `None` (or `Some(0)`) asks the OS for an ephemeral port. A preferred port that cannot be
/// bound falls back to an ephemeral one.
pub async fn bind_callback_listener(
    preferred_port: Option<u16>,
) -> AppResult<BoundCallbackListener> {
    let preferred_port = preferred_port.unwrap_or(0);
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => Err(format!(
            "TRANSPORT_ERROR: oauth callback bind failed: {preferred_err}"
        )
        .into()),
        Err(preferred_err) => {
            tracing::warn!(
                port = preferred_port,
                "oauth callback port unavailable; falling back to a dynamic port: {}",
                preferred_err
            );
            match try_bind_on_port(0).await {
                Ok(bound) => Ok(bound),
                Err(fallback_err) => Err(format!(
                    "TRANSPORT_ERROR: oauth callback bind failed: {preferred_err}; fallback_dynamic_port: {fallback_err}"
                )
                .into()),
            }
        }
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundCallbackListener, String> {
    let mut bind_errors: Vec<String> = Vec::new();
    for host in LOOPBACK_HOSTS {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let port = listener
                    .local_addr()
                    .map_err(|e| format!("{host}:{port} (local_addr failed: {e})"))?
                    .port();
                tracing::debug!(host, port, "oauth callback listener bound");
                return Ok(BoundCallbackListener { port, listener });
            }
            Err(err) => {
                bind_errors.push(format!("{host}:{port} ({err})"));
                // Same port on ::1 would not be reachable as the same callback target.
                if err.kind() == std::io::ErrorKind::AddrInUse {
                    break;
                }
            }
        }
    }
    Err(bind_errors.join("; "))
}

/// A running callback listener.
#[derive(Debug)]
pub struct CallbackServer {
    port: u16,
    task: JoinHandle<()>,
}

impl CallbackServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the listener to finish shutting down, aborting it after `grace`.
    pub async fn closed(self, grace: Duration) {
        let abort = self.task.abort_handle();
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(port = self.port, "oauth callback task failed: {}", err),
            Err(_) => {
                tracing::warn!(
                    port = self.port,
                    grace_ms = grace.as_millis() as u64,
                    "oauth callback listener did not drain in time; aborting"
                );
                abort.abort();
            }
        }
    }
}

#[derive(Clone)]
struct CallbackAppState {
    pending: Weak<PendingLogin>,
    endpoints: &'static ImsEndpoints,
    allow_origin: HeaderValue,
}

/// Starts serving callbacks for `pending` on an already bound listener.
pub fn serve_callbacks(
    bound: BoundCallbackListener,
    pending: &Arc<PendingLogin>,
    env: ImsEnvironment,
) -> AppResult<CallbackServer> {
    let endpoints = env.endpoints();
    let origin = endpoints.login_site_origin()?;
    let allow_origin = HeaderValue::from_str(&origin)
        .map_err(|e| format!("INVALID_CONFIG: login site origin is not a header value: {e}"))?;

    let state = CallbackAppState {
        pending: Arc::downgrade(pending),
        endpoints,
        allow_origin,
    };
    let app = Router::new().fallback(handle_request).with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    pending.attach_listener(shutdown_tx);

    let port = bound.port;
    let serve_pending = Arc::downgrade(pending);
    let task = tokio::spawn(async move {
        let serve = axum::serve(bound.listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        if let Err(err) = serve.await {
            tracing::error!(port, "oauth callback server failed: {}", err);
            if let Some(pending) = serve_pending.upgrade() {
                pending.reject(
                    AppError::new(
                        ErrorKind::TransportError,
                        format!("oauth callback server failed: {err}"),
                    )
                    .with_source(err),
                );
            }
        }
        tracing::debug!(port, "oauth callback listener closed");
    });

    Ok(CallbackServer { port, task })
}

async fn handle_request(State(state): State<CallbackAppState>, req: Request<Body>) -> Response {
    let method = req.method().clone();
    tracing::debug!(method = %method, path = req.uri().path(), "oauth callback request");

    let mut response = match method {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::GET => {
            let query = req.uri().query().unwrap_or_default();
            let params = CallbackParams::from_map(parse_form(query.as_bytes()));
            get_response(&state, settle_callback(&state, &params))
        }
        Method::POST => handle_post(&state, req).await,
        _ => unsupported_method(),
    };
    apply_cors(response.headers_mut(), &state.allow_origin);
    response
}

async fn handle_post(state: &CallbackAppState, req: Request<Body>) -> Response {
    let outcome = match read_form_body(req).await {
        Ok(params) => settle_callback(state, &params),
        Err(err) => {
            tracing::warn!("oauth callback body rejected: {}", err);
            if let Some(pending) = state.pending.upgrade() {
                pending.reject(err.clone());
            }
            Err(err)
        }
    };
    post_response(state, outcome)
}

async fn read_form_body(req: Request<Body>) -> AppResult<CallbackParams> {
    if let Some(content_type) = req.headers().get(header::CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with(FORM_CONTENT_TYPE)
        {
            return Err(AppError::new(
                ErrorKind::TransportError,
                format!("oauth callback body has unsupported content-type '{content_type}'"),
            ));
        }
    }

    let bytes = axum::body::to_bytes(req.into_body(), MAX_CALLBACK_BODY_BYTES)
        .await
        .map_err(|e| format!("TRANSPORT_ERROR: oauth callback body read failed: {e}"))?;
    std::str::from_utf8(&bytes)
        .map_err(|e| format!("TRANSPORT_ERROR: oauth callback body is not utf-8: {e}"))?;

    Ok(CallbackParams::from_map(parse_form(&bytes)))
}

/// Evaluates a callback and hands the outcome to the pending login.
///
/// A valid callback that races an already settled attempt is reported as an error.
fn settle_callback(state: &CallbackAppState, params: &CallbackParams) -> AppResult<()> {
    let Some(pending) = state.pending.upgrade() else {
        return Err(no_longer_pending());
    };

    let outcome = evaluate_callback(params, pending.expected_id());
    let reply = outcome.as_ref().map(|_| ()).map_err(Clone::clone);
    let accepted = pending.deliver(outcome);
    match reply {
        Ok(()) if !accepted => Err(no_longer_pending()),
        other => other,
    }
}

fn no_longer_pending() -> AppError {
    AppError::new(
        ErrorKind::Internal,
        "login attempt is no longer pending",
    )
}

fn get_response(state: &CallbackAppState, outcome: AppResult<()>) -> Response {
    let location = match outcome {
        Ok(()) => state.endpoints.success_page(),
        Err(err) => match state.endpoints.error_page(err.message()) {
            Ok(url) => url,
            Err(page_err) => {
                tracing::error!("oauth error page url invalid: {}", page_err);
                return (StatusCode::INTERNAL_SERVER_ERROR, page_err.to_string()).into_response();
            }
        },
    };
    redirect(&location)
}

#[derive(Debug, Serialize)]
struct PostCallbackReply {
    protocol_version: u8,
    redirect: String,
    error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn post_response(state: &CallbackAppState, outcome: AppResult<()>) -> Response {
    match outcome {
        Ok(()) => (
            StatusCode::OK,
            Json(PostCallbackReply {
                protocol_version: POST_PROTOCOL_VERSION,
                redirect: state.endpoints.success_page(),
                error: false,
                message: None,
            }),
        )
            .into_response(),
        Err(err) => {
            let redirect = state
                .endpoints
                .error_page(err.message())
                .unwrap_or_else(|_| state.endpoints.login_site_url.to_string());
            (
                StatusCode::BAD_REQUEST,
                Json(PostCallbackReply {
                    protocol_version: POST_PROTOCOL_VERSION,
                    redirect,
                    error: true,
                    message: Some(err.message().to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(err) => {
            tracing::error!("oauth redirect location is not a header value: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn unsupported_method() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS))],
        format!("Supported methods: {ALLOWED_METHODS}"),
    )
        .into_response()
}

fn apply_cors(headers: &mut HeaderMap, allow_origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
}

// Last occurrence of a repeated key wins.
fn parse_form(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}
