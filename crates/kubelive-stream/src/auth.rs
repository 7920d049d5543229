//! Credentials for the stream endpoint.
//!
//! The provider is consulted on every connect attempt, so a refreshed token
//! is picked up by the next reconnect without reopening the handle.
//! Providers that can announce changes (sign-in, sign-out, rotation) make
//! the open connection restart right away.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

/// Source of the bearer token. `None` means "not signed in": the
/// connection stays idle without reporting an error.
pub trait TokenProvider: Send + Sync + 'static {
    fn token(&self) -> Option<SecretString>;

    /// Revision counter bumped whenever the token changes. Providers that
    /// return `None` are polled instead.
    fn changes(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<SecretString> + Send + Sync + 'static,
{
    fn token(&self) -> Option<SecretString> {
        self()
    }
}

/// A fixed token, e.g. from `--token` / `KUBELIVE_TOKEN`.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<SecretString> {
        let token = self.0.expose_secret();
        if token.is_empty() {
            return None;
        }
        Some(SecretString::from(token))
    }
}

/// A token the application swaps at runtime. Clones share the same slot,
/// so one clone can be handed to the connection and another kept for
/// sign-in and sign-out.
#[derive(Clone)]
pub struct SharedToken {
    slot: Arc<RwLock<Option<SecretString>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SharedToken {
    pub fn new(token: Option<SecretString>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            slot: Arc::new(RwLock::new(token)),
            revision: Arc::new(revision),
        }
    }

    /// Replaces the token. Storing the value already held is a no-op.
    pub fn set(&self, token: Option<SecretString>) {
        let token = token.filter(|t| !t.expose_secret().is_empty());
        {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            if same_token(slot.as_ref(), token.as_ref()) {
                return;
            }
            *slot = token;
        }
        self.revision.send_modify(|r| *r += 1);
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Number of effective changes so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}

impl Default for SharedToken {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedToken")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

impl TokenProvider for SharedToken {
    fn token(&self) -> Option<SecretString> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|t| SecretString::from(t.expose_secret()))
    }

    fn changes(&self) -> Option<watch::Receiver<u64>> {
        Some(self.revision.subscribe())
    }
}

pub(crate) fn same_token(a: Option<&SecretString>, b: Option<&SecretString>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.expose_secret() == b.expose_secret(),
        _ => false,
    }
}

/// Never yields a token; connecting is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<SecretString> {
        None
    }
}

/// Where the token travels on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>` request header.
    #[default]
    Header,
    /// `token=<token>` query parameter, for backends that only accept
    /// browser-style EventSource auth.
    ///
    /// The full URL, token included, ends up in proxy and server access
    /// logs. Our own logs always print the URL with the token redacted.
    Query,
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_yields_secret() {
        let provider = StaticToken::new("abc");
        let token = provider.token().unwrap();
        assert_eq!(token.expose_secret(), "abc");
    }

    #[test]
    fn empty_static_token_is_absent() {
        assert!(StaticToken::new("").token().is_none());
        assert!(NoToken.token().is_none());
    }

    #[test]
    fn debug_does_not_leak() {
        let shown = format!("{:?}", StaticToken::new("hunter2"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn closures_are_providers() {
        let provider = || Some(SecretString::from("from-closure"));
        assert_eq!(provider.token().unwrap().expose_secret(), "from-closure");
        assert!(provider.changes().is_none());
    }

    #[test]
    fn shared_token_counts_only_real_changes() {
        let shared = SharedToken::default();
        let mut changes = shared.changes().unwrap();
        assert!(shared.token().is_none());

        shared.set(Some(SecretString::from("t1")));
        assert_eq!(shared.revision(), 1);
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        shared.set(Some(SecretString::from("t1")));
        assert_eq!(shared.revision(), 1);
        assert!(!changes.has_changed().unwrap());

        shared.set(Some(SecretString::from("t2")));
        assert_eq!(shared.token().unwrap().expose_secret(), "t2");
        assert_eq!(shared.revision(), 2);
    }

    #[test]
    fn shared_token_clones_share_the_slot() {
        let shared = SharedToken::new(Some(SecretString::from("t1")));
        let handed_out = shared.clone();
        shared.clear();
        assert!(handed_out.token().is_none());
        assert_eq!(handed_out.revision(), 1);

        // Empty tokens count as signed out.
        shared.set(Some(SecretString::from("")));
        assert_eq!(shared.revision(), 1);
        assert!(!format!("{shared:?}").contains("t1"));
    }
}
