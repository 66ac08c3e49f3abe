//! Session storage.
//!
//! Handlers and engines only see the [`SessionStore`] trait. The in-process
//! [`MemorySessionStore`] bounds memory with an LRU capacity and an idle TTL;
//! a networked store can implement the same trait.

use arena_common::util::short_id;
use arena_common::{Error, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A record that can live in a [`SessionStore`].
pub trait StoredSession: Clone + Send + Sync + 'static {
    /// Key under which the record is stored.
    fn id(&self) -> &str;
}

/// Predicate evaluated against the stored record inside the store's lock.
pub type Precondition<'a, S> = &'a (dyn Fn(&S) -> bool + Send + Sync);

/// Storage backend for sessions of type `S`.
///
/// `get` returns a snapshot; changes become visible only through
/// `insert`/`update`/`compare_and_update`.
#[async_trait]
pub trait SessionStore<S: StoredSession>: Send + Sync {
    /// Insert or replace a record.
    async fn insert(&self, session: S);

    /// Insert a record only if no live record has its id; `Conflict`
    /// otherwise.
    async fn insert_new(&self, session: S) -> Result<()>;

    /// Snapshot of the record, or `NotFound`.
    async fn get(&self, id: &str) -> Result<S>;

    /// Replace an existing record, or `NotFound`.
    async fn update(&self, session: S) -> Result<()>;

    /// Replace an existing record if `precondition` holds for the stored
    /// version; `Conflict` otherwise.
    async fn compare_and_update(&self, session: S, precondition: Precondition<'_, S>) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: &str) -> bool;

    /// Number of live records.
    async fn len(&self) -> usize;

    /// Snapshots of all live records.
    async fn list(&self) -> Vec<S>;

    /// Drop expired records, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

struct Entry<S> {
    session: S,
    touched: Instant,
}

impl<S> Entry<S> {
    fn new(session: S) -> Self {
        Self {
            session,
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.touched) > ttl
    }
}

/// In-process store with LRU eviction and idle expiry.
pub struct MemorySessionStore<S> {
    entries: Mutex<LruCache<String, Entry<S>>>,
    idle_ttl: Duration,
}

impl<S: StoredSession> MemorySessionStore<S> {
    /// Create a store holding at most `capacity` records, each expiring after
    /// `idle_ttl` without access.
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            idle_ttl,
        }
    }

    fn not_found(id: &str) -> Error {
        Error::NotFound(format!("session {}", short_id(id)))
    }

    /// Remove `id` if it has expired. Returns true when it is still live.
    fn check_live(&self, entries: &mut LruCache<String, Entry<S>>, id: &str) -> bool {
        let expired = match entries.peek(id) {
            Some(entry) => entry.is_expired(Instant::now(), self.idle_ttl),
            None => return false,
        };
        if expired {
            entries.pop(id);
            tracing::debug!(session = %short_id(id), "Session expired");
        }
        !expired
    }

    fn push(entries: &mut LruCache<String, Entry<S>>, session: S) {
        let id = session.id().to_string();
        if let Some((evicted, _)) = entries.push(id.clone(), Entry::new(session)) {
            if evicted != id {
                tracing::info!(session = %short_id(&evicted), "Session evicted (capacity reached)");
            }
        }
    }
}

#[async_trait]
impl<S: StoredSession> SessionStore<S> for MemorySessionStore<S> {
    async fn insert(&self, session: S) {
        let mut entries = self.entries.lock().await;
        Self::push(&mut entries, session);
    }

    async fn insert_new(&self, session: S) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if self.check_live(&mut entries, session.id()) {
            return Err(Error::Conflict(format!(
                "session {} already exists",
                short_id(session.id())
            )));
        }
        Self::push(&mut entries, session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<S> {
        let mut entries = self.entries.lock().await;
        if !self.check_live(&mut entries, id) {
            return Err(Self::not_found(id));
        }
        match entries.get_mut(id) {
            Some(entry) => {
                entry.touched = Instant::now();
                Ok(entry.session.clone())
            }
            None => Err(Self::not_found(id)),
        }
    }

    async fn update(&self, session: S) -> Result<()> {
        self.compare_and_update(session, &|_: &S| true).await
    }

    async fn compare_and_update(&self, session: S, precondition: Precondition<'_, S>) -> Result<()> {
        let id = session.id().to_string();
        let mut entries = self.entries.lock().await;
        if !self.check_live(&mut entries, &id) {
            return Err(Self::not_found(&id));
        }
        match entries.peek(&id) {
            Some(current) if !precondition(&current.session) => Err(Error::Conflict(format!(
                "session {} was modified concurrently",
                short_id(&id)
            ))),
            Some(_) => {
                entries.put(id, Entry::new(session));
                Ok(())
            }
            None => Err(Self::not_found(&id)),
        }
    }

    async fn delete(&self, id: &str) -> bool {
        self.entries.lock().await.pop(id).is_some()
    }

    async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.idle_ttl))
            .count()
    }

    async fn list(&self) -> Vec<S> {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.idle_ttl))
            .map(|(_, entry)| entry.session.clone())
            .collect()
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.idle_ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        expired.len()
    }
}
