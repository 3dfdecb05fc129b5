//! Shared-secret upload gate.
//!
//! The client token arrives once in the launch query; the server token is read in
//! cleartext from a well-known object in the same store uploads go to. Anyone able to
//! read that store can read the secret, so the gate deters casual misuse only and is
//! not an access-control boundary.

use std::sync::Arc;

use imgdrop_storage::{Storage, StorageError};
use subtle::ConstantTimeEq;

/// Gate decision for one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    Closed,
}

/// Tokens captured at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub client_token: Option<String>,
    pub server_token: Option<String>,
}

impl AuthorizationContext {
    pub fn new(client_token: Option<String>, server_token: Option<String>) -> Self {
        Self {
            client_token,
            server_token,
        }
    }

    /// Read `param` from a launch query such as `?token=abc&lang=en`.
    ///
    /// The first occurrence wins. The value is percent-decoded; `+` is not treated as a
    /// space so tokens containing it compare as issued. An empty value is absent.
    pub fn token_from_launch_query(query: &str, param: &str) -> Option<String> {
        let query = query.strip_prefix('?').unwrap_or(query);
        query
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(name, _)| urlencoding::decode(name).map(|n| n == param).unwrap_or(false))
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|value| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

/// Read the server-issued token stored at `key`.
///
/// Missing, unreadable and non-UTF-8 objects all mean "no server token", which keeps
/// the gate closed.
pub async fn fetch_server_token(storage: &Arc<dyn Storage>, key: &str) -> Option<String> {
    match storage.download(key).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(token) => Some(token),
            Err(_) => {
                tracing::warn!(key = %key, "Server token is not valid UTF-8");
                None
            }
        },
        Err(StorageError::NotFound(_)) => {
            tracing::warn!(key = %key, "Server token object not found");
            None
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to read server token");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    /// `Open` iff both tokens are present and byte-equal. No trimming or case folding.
    pub fn authorize(&self, context: &AuthorizationContext) -> GateDecision {
        match (&context.client_token, &context.server_token) {
            (Some(client), Some(server)) if bool::from(client.as_bytes().ct_eq(server.as_bytes())) => {
                GateDecision::Open
            }
            _ => GateDecision::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgdrop_storage::MemoryStorage;

    fn ctx(client: Option<&str>, server: Option<&str>) -> AuthorizationContext {
        AuthorizationContext::new(client.map(String::from), server.map(String::from))
    }

    #[test]
    fn test_open_only_on_exact_match() {
        let gate = AccessGate;
        assert_eq!(gate.authorize(&ctx(Some("E1Hsvc3k"), Some("E1Hsvc3k"))), GateDecision::Open);
        assert_eq!(gate.authorize(&ctx(Some("E1Hsvc3k"), Some("other"))), GateDecision::Closed);
        assert_eq!(gate.authorize(&ctx(None, Some("X"))), GateDecision::Closed);
        assert_eq!(gate.authorize(&ctx(Some("X"), None)), GateDecision::Closed);
        assert_eq!(gate.authorize(&ctx(None, None)), GateDecision::Closed);
    }

    #[test]
    fn test_comparison_is_case_and_whitespace_sensitive() {
        let gate = AccessGate;
        assert_eq!(gate.authorize(&ctx(Some("e1hsvc3k"), Some("E1Hsvc3k"))), GateDecision::Closed);
        assert_eq!(gate.authorize(&ctx(Some("E1Hsvc3k"), Some("E1Hsvc3k\n"))), GateDecision::Closed);
    }

    #[test]
    fn test_token_from_launch_query() {
        let parse = AuthorizationContext::token_from_launch_query;
        assert_eq!(parse("?token=E1Hsvc3k", "token").as_deref(), Some("E1Hsvc3k"));
        assert_eq!(parse("lang=en&token=a%2Bb&token=second", "token").as_deref(), Some("a+b"));
        assert_eq!(parse("token=a+b", "token").as_deref(), Some("a+b"));
        assert_eq!(parse("?token=", "token"), None);
        assert_eq!(parse("?token", "token"), None);
        assert_eq!(parse("", "token"), None);
        assert_eq!(parse("?other=1", "token"), None);
        assert_eq!(parse("?key=abc", "key").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_fetch_server_token() {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();

        assert_eq!(fetch_server_token(&storage, "config/upload_token").await, None);

        memory.insert("config/upload_token", b"E1Hsvc3k".to_vec());
        assert_eq!(
            fetch_server_token(&storage, "config/upload_token").await.as_deref(),
            Some("E1Hsvc3k")
        );

        memory.insert("config/upload_token", vec![0xff, 0xfe]);
        assert_eq!(fetch_server_token(&storage, "config/upload_token").await, None);
    }
}
