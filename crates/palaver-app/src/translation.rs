//! Per-message translation cache.
//!
//! Caches translated text per (message id, target language). Concurrent
//! requests for the same pair share one outbound translator call
//! (single-flight): the first caller becomes the leader, later callers
//! await a watch channel the leader resolves. Failures fall back to the
//! original text and cache nothing, so the next request retries.
//!
//! On language switch only a bounded window of the most recent visible
//! messages is translated eagerly; the remainder translate lazily on
//! display. Entries never expire within a session and are dropped when
//! the room view closes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use palaver_client::Translator;
use palaver_core::{ChatMessage, MessageId};
use tokio::sync::watch;

type CacheKey = (MessageId, String);

enum Slot {
    Ready(String),
    InFlight(watch::Receiver<Option<String>>),
}

enum Claim {
    Ready(String),
    Wait(watch::Receiver<Option<String>>),
    Leader(watch::Sender<Option<String>>),
}

/// Translated-text cache for the open room.
pub struct TranslationOverlay<T> {
    translator: Arc<T>,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl<T: Translator> TranslationOverlay<T> {
    /// Create an empty overlay over the given translator.
    pub fn new(translator: Arc<T>) -> Self {
        Self { translator, entries: Mutex::new(HashMap::new()) }
    }

    /// Translated body of `message` in `language`.
    ///
    /// Returns the cached text when present; otherwise invokes the
    /// translator once (shared with any concurrent caller for the same
    /// pair), caches on success, and falls back to the original body on
    /// failure without caching.
    pub async fn get_or_translate(&self, message: &ChatMessage, language: &str) -> String {
        // Translate from the original when the body already holds a
        // translated rendition.
        let source = message.original_body.as_deref().unwrap_or(&message.body);
        let key = (message.id, language.to_string());

        match self.claim(&key) {
            Claim::Ready(text) => text,
            Claim::Wait(mut updates) => {
                loop {
                    let resolved = updates.borrow_and_update().clone();
                    if let Some(text) = resolved {
                        return text;
                    }
                    if updates.changed().await.is_err() {
                        // Leader failed; fall back, do not cache.
                        return source.to_string();
                    }
                }
            },
            Claim::Leader(resolve) => match self.translator.translate(source, language).await {
                Ok(text) => {
                    self.lock().insert(key, Slot::Ready(text.clone()));
                    let _ = resolve.send(Some(text.clone()));
                    text
                },
                Err(error) => {
                    tracing::debug!(%error, "translation failed, falling back to original");
                    self.lock().remove(&key);
                    // Dropping the sender wakes waiters into the fallback.
                    drop(resolve);
                    source.to_string()
                },
            },
        }
    }

    /// Warm the cache for the most recent `window` messages.
    ///
    /// `messages` must be display-ordered (most recent first); anything
    /// beyond the window translates lazily on display.
    pub async fn eager_translate(&self, messages: &[ChatMessage], language: &str, window: usize) {
        let warm =
            messages.iter().take(window).map(|message| self.get_or_translate(message, language));
        futures::future::join_all(warm).await;
    }

    /// Cached translation for a (message, language) pair, if resolved.
    pub fn cached(&self, id: MessageId, language: &str) -> Option<String> {
        match self.lock().get(&(id, language.to_string())) {
            Some(Slot::Ready(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Number of resolved cache entries.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }

    /// Whether the cache holds no resolved entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries (room view closed).
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn claim(&self, key: &CacheKey) -> Claim {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(Slot::Ready(text)) => Claim::Ready(text.clone()),
            Some(Slot::InFlight(updates)) => Claim::Wait(updates.clone()),
            None => {
                let (resolve, updates) = watch::channel(None);
                entries.insert(key.clone(), Slot::InFlight(updates));
                Claim::Leader(resolve)
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use palaver_client::TranslationError;
    use palaver_core::DeliveryStatus;

    use super::*;

    /// Translator fake counting calls, with an optional artificial delay so
    /// tests can overlap requests.
    struct FakeTranslator {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl FakeTranslator {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: false }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            target_language: &str,
        ) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(TranslationError::Unavailable { reason: "down".to_string() });
            }
            Ok(format!("{target_language}:{text}"))
        }
    }

    fn message(id: u64, body: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(id),
            room_id: 42,
            sender_id: 2,
            sender_name: "peer".to_string(),
            body: body.to_string(),
            original_body: None,
            sent_at_ms: id * 100,
            status: DeliveryStatus::Confirmed,
        }
    }

    #[tokio::test]
    async fn translates_and_caches() {
        let translator = Arc::new(FakeTranslator::new());
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        let msg = message(1, "hei");

        assert_eq!(overlay.get_or_translate(&msg, "en").await, "en:hei");
        assert_eq!(overlay.get_or_translate(&msg, "en").await, "en:hei");
        assert_eq!(translator.calls(), 1);
        assert_eq!(overlay.cached(msg.id, "en"), Some("en:hei".to_string()));
    }

    #[tokio::test]
    async fn languages_cache_independently() {
        let translator = Arc::new(FakeTranslator::new());
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        let msg = message(1, "hei");

        assert_eq!(overlay.get_or_translate(&msg, "en").await, "en:hei");
        assert_eq!(overlay.get_or_translate(&msg, "fi").await, "fi:hei");
        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_single_flight() {
        let translator =
            Arc::new(FakeTranslator { delay: Duration::from_millis(20), ..FakeTranslator::new() });
        let overlay = Arc::new(TranslationOverlay::new(Arc::clone(&translator)));
        let msg = message(1, "hei");

        let (first, second) = tokio::join!(
            overlay.get_or_translate(&msg, "en"),
            overlay.get_or_translate(&msg, "en"),
        );

        assert_eq!(first, "en:hei");
        assert_eq!(second, "en:hei");
        assert_eq!(translator.calls(), 1);
    }

    #[tokio::test]
    async fn failure_falls_back_and_does_not_cache() {
        let translator = Arc::new(FakeTranslator { fail: true, ..FakeTranslator::new() });
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        let msg = message(1, "hei");

        assert_eq!(overlay.get_or_translate(&msg, "en").await, "hei");
        assert!(overlay.is_empty());

        // Next call retries the translator.
        assert_eq!(overlay.get_or_translate(&msg, "en").await, "hei");
        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn eager_translates_only_the_window() {
        let translator = Arc::new(FakeTranslator::new());
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        // Display order: most recent first.
        let messages = vec![message(3, "c"), message(2, "b"), message(1, "a")];

        overlay.eager_translate(&messages, "en", 2).await;

        assert_eq!(translator.calls(), 2);
        assert!(overlay.cached(MessageId::Server(3), "en").is_some());
        assert!(overlay.cached(MessageId::Server(2), "en").is_some());
        assert!(overlay.cached(MessageId::Server(1), "en").is_none());

        // Scrolling to the older message translates it lazily.
        assert_eq!(overlay.get_or_translate(&messages[2], "en").await, "en:a");
        assert_eq!(translator.calls(), 3);
    }

    #[tokio::test]
    async fn translates_from_original_body() {
        let translator = Arc::new(FakeTranslator::new());
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        let msg = message(1, "hei").with_translation("hello");

        assert_eq!(overlay.get_or_translate(&msg, "fi").await, "fi:hei");
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let translator = Arc::new(FakeTranslator::new());
        let overlay = TranslationOverlay::new(Arc::clone(&translator));
        let msg = message(1, "hei");

        let _ = overlay.get_or_translate(&msg, "en").await;
        overlay.clear();
        assert!(overlay.is_empty());

        let _ = overlay.get_or_translate(&msg, "en").await;
        assert_eq!(translator.calls(), 2);
    }
}
