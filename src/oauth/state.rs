//! Usage: Per-attempt correlation state (random session id + the state echoed by the login site).

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;

const SESSION_ID_BYTES: usize = 4;

/// Generates an unguessable session id: 4 bytes from the OS CSPRNG, hex encoded.
pub fn random_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// State created once per login attempt and embedded in the auth-site URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub id: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
}

impl SessionState {
    pub(crate) fn new(port: u16) -> Self {
        Self {
            id: random_id(),
            port,
            client_id: None,
            scope: None,
            redirect_uri: None,
        }
    }
}

/// The `state` parameter as echoed back in a callback.
///
/// Any field may be missing; unknown fields are kept so they can be logged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EchoedState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub port: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EchoedState {
    /// Parses the JSON `state` parameter. Absent or malformed input yields an empty state.
    pub(crate) fn parse_lossy(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<EchoedState>(raw) {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!("oauth callback state is not valid json: {}", err);
                Self::default()
            }
        }
    }
}
