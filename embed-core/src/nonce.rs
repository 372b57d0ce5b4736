//! Session nonce: generation, target location construction, peer-side extraction.

use std::fmt;

use crate::protocol::NONCE_PARAM;

/// Per-session token. Binds inbound messages to the session that generated it.
/// Immutable once created; a new session always gets a new nonce.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh random nonce (128 bits, lowercase hex).
    pub fn generate() -> Self {
        Nonce(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing token. Used by tests and hosts that mint their own nonces.
    pub fn from_string(token: impl Into<String>) -> Self {
        Nonce(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against an untrusted key.
    pub fn matches(&self, key: &str) -> bool {
        self.0 == key
    }
}

// Redacted: the token must not end up in logs through `{:?}`.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}

/// Build the location the frame loads: `source` plus the nonce query parameter,
/// joined with `?` when `source` has no query string yet and `&` otherwise.
pub fn target_location(source: &str, nonce: &Nonce) -> String {
    let sep = if source.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", source, sep, NONCE_PARAM, nonce.as_str())
}

/// Peer side: read the nonce back out of the location the frame was loaded from.
/// Returns the first `k` parameter of the query string, ignoring any fragment.
pub fn nonce_from_location(location: &str) -> Option<&str> {
    let (_, query) = location.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == NONCE_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
