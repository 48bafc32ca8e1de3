//! Session storage.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A single session: a flat key/value mapping.
///
/// Each session owns its own lock, so writers on different sessions never
/// contend and every `set` is atomic with respect to the session's mapping.
#[derive(Debug)]
pub struct Session {
    id: String,
    values: RwLock<HashMap<String, Value>>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            values: RwLock::new(HashMap::new()),
            created_at: now,
            last_activity: RwLock::new(now),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert or overwrite a key.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        write(&self.values).insert(key.into(), value);
        self.touch();
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = read(&self.values).get(key).cloned();
        self.touch();
        value
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        read(&self.values).keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.values).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *read(&self.last_activity)
    }

    fn touch(&self) {
        *write(&self.last_activity) = Utc::now();
    }

    /// Check whether the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_idle_for(&self, timeout: Duration) -> bool {
        match (Utc::now() - self.last_activity()).to_std() {
            Ok(idle) => idle > timeout,
            // "last" is in the future: clock skew
            Err(_) => false,
        }
    }
}

/// Process-lifetime store of sessions.
///
/// Sessions are created lazily by [`SessionStore::set`] and are never evicted
/// unless [`SessionStore::cleanup_idle`] is called.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session identifier.
    #[must_use]
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Get a session by ID, creating it if it doesn't exist.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = read(&self.sessions).get(id) {
            return Arc::clone(session);
        }

        // Re-check under the write lock: another writer may have created it.
        let mut guard = write(&self.sessions);
        Arc::clone(
            guard
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Session::new(id.to_string()))),
        )
    }

    #[must_use]
    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        read(&self.sessions).get(id).cloned()
    }

    /// Create the session if absent, then insert or overwrite `key`.
    ///
    /// The write happens while the session map is still locked, so
    /// [`SessionStore::cleanup_idle`] cannot evict the session between lookup
    /// and write.
    pub fn set(&self, session_id: &str, key: impl Into<String>, value: Value) {
        let key = key.into();
        {
            let guard = read(&self.sessions);
            if let Some(session) = guard.get(session_id) {
                session.set(key, value);
                return;
            }
        }

        let mut guard = write(&self.sessions);
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Session::new(session_id.to_string())))
            .set(key, value);
    }

    /// Absent session or key yields `None`; never creates a session.
    #[must_use]
    pub fn get(&self, session_id: &str, key: &str) -> Option<Value> {
        self.session(session_id)?.get(key)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        write(&self.sessions).remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        read(&self.sessions).keys().cloned().collect()
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_idle(&self, timeout: Duration) -> usize {
        let mut guard = write(&self.sessions);
        let before = guard.len();
        guard.retain(|_, session| !session.is_idle_for(timeout));
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let store = SessionStore::new();
        store.set("s1", "k", json!("v"));

        assert_eq!(store.get("s1", "k"), Some(json!("v")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_absent_is_none_and_does_not_create() {
        let store = SessionStore::new();
        assert_eq!(store.get("nope", "k"), None);
        assert!(store.is_empty());

        store.set("s1", "k", json!(1));
        assert_eq!(store.get("s1", "other"), None);
    }

    #[test]
    fn test_overwrite() {
        let store = SessionStore::new();
        store.set("s1", "k", json!(1));
        store.set("s1", "k", json!({"nested": [1, 2]}));
        assert_eq!(store.get("s1", "k"), Some(json!({"nested": [1, 2]})));
        assert_eq!(store.session("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.set("shared", "k", json!(true));
        assert_eq!(other.get("shared", "k"), Some(json!(true)));
    }

    #[test]
    fn test_concurrent_writers_different_keys() {
        let store = SessionStore::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.set("hot", format!("k{t}-{i}"), json!(i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.session("hot").unwrap().len(), 800);
        assert_eq!(store.get("hot", "k7-99"), Some(json!(99)));
    }

    #[test]
    fn test_cleanup_idle() {
        let store = SessionStore::new();
        store.set("a", "k", json!(1));
        store.set("b", "k", json!(2));

        assert_eq!(store.cleanup_idle(Duration::from_secs(3600)), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.cleanup_idle(Duration::from_millis(1)), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_to_idle_session_survives_sweep() {
        let store = SessionStore::new();
        store.set("s", "before", json!(0));
        std::thread::sleep(Duration::from_millis(80));

        store.set("s", "after", json!(1));
        assert_eq!(store.cleanup_idle(Duration::from_millis(40)), 0);
        assert_eq!(store.get("s", "after"), Some(json!(1)));
    }

    #[test]
    fn test_acknowledged_writes_not_lost_to_sweeper() {
        let store = SessionStore::new();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let sweeper = {
            let store = store.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    store.cleanup_idle(Duration::from_millis(50));
                }
            })
        };

        for i in 0..10 {
            // Let the session go idle so the sweeper is racing the write.
            std::thread::sleep(Duration::from_millis(60));
            store.set("hot", format!("k{i}"), json!(i));
            assert_eq!(store.get("hot", &format!("k{i}")), Some(json!(i)));
        }

        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        sweeper.join().unwrap();
    }

    #[test]
    fn test_remove_and_list() {
        let store = SessionStore::new();
        store.set("a", "k", json!(1));
        store.set("b", "k", json!(1));

        let mut ids = store.list_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(store.list_ids(), vec!["b"]);
    }
}
