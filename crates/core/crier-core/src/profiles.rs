//! User profiles: spoken nicknames and reference voice samples
//!
//! Profiles live in a persistent store behind the [`ProfileStore`] trait and
//! are read-through cached in memory. Writes are optimistic: the cache is
//! updated before the store, and a store failure keeps the in-memory value
//! so the session keeps behaving consistently even when persistence lags.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;

/// A user's stored profile row(s).
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// Platform username (the lookup key)
    pub username: String,
    /// Spoken display name override
    pub nickname: Option<String>,
    /// Reference voice sample file name
    pub voice_sample: Option<String>,
}

/// Persistent nickname/voice lookup. Implementations must tolerate
/// concurrent calls from every guild session.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a user's profile; `None` when nothing is stored for them.
    async fn fetch(&self, username: &str) -> Result<Option<UserProfile>>;

    /// Persist a nickname, overwriting any previous one.
    async fn store_nickname(&self, username: &str, nickname: &str) -> Result<()>;

    /// Persist a voice sample choice, overwriting any previous one.
    async fn store_voice(&self, username: &str, voice: &str) -> Result<()>;
}

/// How a user should sound: resolved display name plus optional sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerIdentity {
    /// Name announced before the message text
    pub display_name: String,
    /// Chosen reference sample, `None` for the configured default
    pub voice_sample: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct CacheSlot {
    nickname: Option<String>,
    voice_sample: Option<String>,
}

/// Read-through cache over a [`ProfileStore`].
pub struct ProfileCache {
    store: Arc<dyn ProfileStore>,
    cache: RwLock<HashMap<String, CacheSlot>>,
}

impl ProfileCache {
    /// Wrap a store in an empty cache.
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve how `username` should be announced. A store failure falls
    /// back to defaults (raw username, default sample) and is not cached.
    pub async fn resolve(&self, username: &str) -> SpeakerIdentity {
        let slot = self.lookup(username).await;
        SpeakerIdentity {
            display_name: slot
                .nickname
                .unwrap_or_else(|| username.to_string()),
            voice_sample: slot.voice_sample,
        }
    }

    /// The user's current voice sample choice, if any.
    pub async fn voice_of(&self, username: &str) -> Option<String> {
        self.lookup(username).await.voice_sample
    }

    /// Register a nickname. The cache is updated even when persisting
    /// fails; the error is returned so the caller can report it.
    pub async fn set_nickname(&self, username: &str, nickname: &str) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.entry(username.to_string()).or_default().nickname = Some(nickname.to_string());
        }
        self.store
            .store_nickname(username, nickname)
            .await
            .map_err(|e| {
                warn!(username, error = %e, "failed to persist nickname, keeping in-memory value");
                e
            })
    }

    /// Register a voice sample. Same optimistic-write policy as
    /// [`set_nickname`](Self::set_nickname).
    pub async fn set_voice(&self, username: &str, voice: &str) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.entry(username.to_string()).or_default().voice_sample = Some(voice.to_string());
        }
        self.store.store_voice(username, voice).await.map_err(|e| {
            warn!(username, error = %e, "failed to persist voice choice, keeping in-memory value");
            e
        })
    }

    async fn lookup(&self, username: &str) -> CacheSlot {
        if let Some(slot) = self.cache.read().await.get(username) {
            return slot.clone();
        }
        match self.store.fetch(username).await {
            Ok(profile) => {
                let slot = match profile {
                    Some(p) => CacheSlot {
                        nickname: p.nickname,
                        voice_sample: p.voice_sample,
                    },
                    // cache the miss so defaults don't hit the store on
                    // every message
                    None => CacheSlot::default(),
                };
                self.cache
                    .write()
                    .await
                    .insert(username.to_string(), slot.clone());
                slot
            }
            Err(e) => {
                warn!(username, error = %e, "profile store read failed, using defaults");
                CacheSlot::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrierError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeStore {
        profile: std::sync::Mutex<Option<UserProfile>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ProfileStore for FakeStore {
        async fn fetch(&self, _username: &str) -> Result<Option<UserProfile>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(CrierError::store("read refused"));
            }
            Ok(self.profile.lock().unwrap().clone())
        }

        async fn store_nickname(&self, _username: &str, _nickname: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(CrierError::store("write refused"));
            }
            Ok(())
        }

        async fn store_voice(&self, _username: &str, _voice: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(CrierError::store("write refused"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolves_stored_profile() {
        let store = Arc::new(FakeStore::default());
        *store.profile.lock().unwrap() = Some(UserProfile {
            username: "highwind".into(),
            nickname: Some("Kain".into()),
            voice_sample: Some("kain.wav".into()),
        });
        let cache = ProfileCache::new(store);

        let speaker = cache.resolve("highwind").await;
        assert_eq!(speaker.display_name, "Kain");
        assert_eq!(speaker.voice_sample.as_deref(), Some("kain.wav"));
    }

    #[tokio::test]
    async fn missing_profile_falls_back_to_username() {
        let cache = ProfileCache::new(Arc::new(FakeStore::default()));
        let speaker = cache.resolve("alice").await;
        assert_eq!(speaker.display_name, "alice");
        assert_eq!(speaker.voice_sample, None);
    }

    #[tokio::test]
    async fn read_failure_uses_defaults_and_is_not_cached() {
        let store = Arc::new(FakeStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let cache = ProfileCache::new(store.clone());

        let speaker = cache.resolve("alice").await;
        assert_eq!(speaker.display_name, "alice");

        // store recovers: the next resolve hits it again
        store.fail_reads.store(false, Ordering::SeqCst);
        *store.profile.lock().unwrap() = Some(UserProfile {
            username: "alice".into(),
            nickname: Some("Echo".into()),
            voice_sample: None,
        });
        let speaker = cache.resolve("alice").await;
        assert_eq!(speaker.display_name, "Echo");
    }

    #[tokio::test]
    async fn lookups_are_cached() {
        let store = Arc::new(FakeStore::default());
        let cache = ProfileCache::new(store.clone());
        cache.resolve("alice").await;
        cache.resolve("alice").await;
        cache.voice_of("alice").await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_optimistic_value() {
        let store = Arc::new(FakeStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let cache = ProfileCache::new(store);

        assert!(cache.set_nickname("alice", "Echo").await.is_err());
        assert!(cache.set_voice("alice", "echo.wav").await.is_err());

        // the in-memory values survive the failed persistence
        let speaker = cache.resolve("alice").await;
        assert_eq!(speaker.display_name, "Echo");
        assert_eq!(speaker.voice_sample.as_deref(), Some("echo.wav"));
    }
}
