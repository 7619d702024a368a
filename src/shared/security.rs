//! Usage: Security-sensitive helpers (secret masking for logs, constant-time state comparison).

use subtle::ConstantTimeEq;

const MASK_PREFIX_LEN: usize = 4;
const MASK_SUFFIX_LEN: usize = 4;

/// Redacts an authorization code, token or client secret for log output.
pub(crate) fn mask_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();
    if len <= MASK_PREFIX_LEN + MASK_SUFFIX_LEN {
        return "*".repeat(len.min(8));
    }

    let prefix: String = chars[..MASK_PREFIX_LEN].iter().collect();
    let suffix: String = chars[len - MASK_SUFFIX_LEN..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// Compares the echoed session id against the expected one without leaking timing.
pub(crate) fn session_ids_match(expected: &str, echoed: Option<&str>) -> bool {
    let Some(echoed) = echoed else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(echoed.as_bytes()).into()
}
