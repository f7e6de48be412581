//! Local secure key-value storage boundary.
//!
//! The platform's secure storage (keychain, keystore) is an external
//! collaborator; values are opaque strings under well-known keys. The
//! in-memory backend serves tests and embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

/// Well-known storage keys.
pub mod keys {
    /// Bearer token for the authenticated session.
    pub const SESSION_TOKEN: &str = "session.token";

    /// Preferred translation target language.
    pub const LANGUAGE: &str = "pref.language";
}

/// Opaque string key-value storage.
#[async_trait]
pub trait SecureStore: Send + Sync + 'static {
    /// Value under `key`. `None` if absent.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any prior value.
    async fn set(&self, key: &str, value: &str);
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get(keys::SESSION_TOKEN).await, None);

        store.set(keys::SESSION_TOKEN, "tok").await;
        assert_eq!(store.get(keys::SESSION_TOKEN).await, Some("tok".to_string()));

        store.set(keys::SESSION_TOKEN, "tok2").await;
        assert_eq!(store.get(keys::SESSION_TOKEN).await, Some("tok2".to_string()));
    }
}
