//! Credential selection seam.
//!
//! The host environment may own API key selection (a key picker, a secrets
//! prompt). The studio only needs two calls from it, so the capability is an
//! injected trait with a no-op default for hosts that have none.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Environment variables consulted for an API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Host-provided key selection capability.
#[async_trait]
pub trait CredentialHost: Send + Sync {
    /// Returns true if a key is currently selected.
    async fn has_selected_key(&self) -> bool;

    /// Opens the host's key selection flow and waits for it to finish.
    ///
    /// Completion does not imply a key was chosen; the user may cancel.
    async fn open_key_selection(&self);
}

/// Host without a credential capability: always satisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentialHost;

#[async_trait]
impl CredentialHost for NoCredentialHost {
    async fn has_selected_key(&self) -> bool {
        true
    }

    async fn open_key_selection(&self) {}
}

#[async_trait]
impl<T: CredentialHost + ?Sized> CredentialHost for Arc<T> {
    async fn has_selected_key(&self) -> bool {
        (**self).has_selected_key().await
    }

    async fn open_key_selection(&self) {
        (**self).open_key_selection().await
    }
}

/// Asks the host for a key when none is selected.
pub async fn ensure_key_selected(host: &dyn CredentialHost) {
    if !host.has_selected_key().await {
        tracing::debug!("no API key selected, opening key selection");
        host.open_key_selection().await;
    }
}

/// Shared, replaceable API key.
///
/// Cloning shares the same cell, so a credential host can swap the key that a
/// provider reads on its next request.
#[derive(Clone, Default)]
pub struct KeySlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl KeySlot {
    /// Creates a slot holding `key`, if any.
    pub fn new(key: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key.filter(|k| !k.trim().is_empty()))),
        }
    }

    /// Creates a slot from the first non-empty key environment variable.
    pub fn from_env() -> Self {
        Self::new(
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty())),
        )
    }

    /// Returns the current key.
    pub fn get(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the key. Blank input clears the slot.
    pub fn set(&self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        let value = (!key.is_empty()).then_some(key);
        match self.inner.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Returns true if a key is present.
    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for KeySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}
