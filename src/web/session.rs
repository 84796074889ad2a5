//! Per-browser sessions: uploaded documents and the last reconstruction.
//!
//! Sessions are keyed by a random UUID carried in a cookie. The map itself
//! sits behind a short-lived `std::sync::Mutex`; each session's data sits
//! behind its own `tokio::sync::Mutex`, held across an analysis so one
//! user's actions run one at a time without blocking anyone else.

use crate::output::{DocumentEvidence, Reconstruction};
use crate::pipeline::intake::Document;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "pathway_session";

pub type SessionId = Uuid;

/// What one browser session holds.
#[derive(Debug, Default)]
pub struct Session {
    /// The current upload set, replaced wholesale on every analysis.
    pub documents: Vec<Document>,
    pub reconstruction: Option<Reconstruction>,
    /// Evidence per document, located on first view.
    pub evidence: Vec<Option<DocumentEvidence>>,
}

impl Session {
    /// Replace the upload set and drop everything derived from the old one.
    pub fn replace_documents(&mut self, documents: Vec<Document>) {
        self.evidence = vec![None; documents.len()];
        self.documents = documents;
        self.reconstruction = None;
    }
}

struct Entry {
    data: Arc<AsyncMutex<Session>>,
    last_seen: Instant,
}

/// All live sessions.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Existing session for `id`, or a fresh one with a new id.
    ///
    /// Expired sessions are evicted on every call.
    pub fn get_or_create(&self, id: Option<SessionId>) -> (SessionId, Arc<AsyncMutex<Session>>) {
        let now = Instant::now();
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        self.evict_expired(&mut map, now);

        if let Some(id) = id {
            if let Some(entry) = map.get_mut(&id) {
                entry.last_seen = now;
                return (id, Arc::clone(&entry.data));
            }
        }

        let id = Uuid::new_v4();
        let data = Arc::new(AsyncMutex::new(Session::default()));
        map.insert(
            id,
            Entry {
                data: Arc::clone(&data),
                last_seen: now,
            },
        );
        debug!("New session {} ({} live)", id, map.len());
        (id, data)
    }

    /// Existing, unexpired session for `id`.
    pub fn get(&self, id: SessionId) -> Option<Arc<AsyncMutex<Session>>> {
        let now = Instant::now();
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        self.evict_expired(&mut map, now);
        map.get_mut(&id).map(|entry| {
            entry.last_seen = now;
            Arc::clone(&entry.data)
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(&self, map: &mut HashMap<SessionId, Entry>, now: Instant) {
        let before = map.len();
        map.retain(|_, e| now.duration_since(e.last_seen) < self.ttl);
        let evicted = before - map.len();
        if evicted > 0 {
            debug!("Evicted {} expired session(s)", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_id_returns_same_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, a) = store.get_or_create(None);
        let (id2, b) = store.get_or_create(Some(id));
        assert_eq!(id, id2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_gets_fresh_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, _) = store.get_or_create(Some(Uuid::new_v4()));
        assert!(store.get(id).is_some());
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn expired_sessions_are_evicted() {
        let store = SessionStore::new(Duration::ZERO);
        let (id, _) = store.get_or_create(None);
        assert!(store.get(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn replacing_documents_clears_results() {
        let mut session = Session::default();
        let doc = Document::from_upload("a.pdf", b"%PDF-1.4".to_vec(), 1024).unwrap();
        session.replace_documents(vec![doc.clone(), doc]);
        assert_eq!(session.evidence.len(), 2);
        assert!(session.reconstruction.is_none());
    }

    #[test]
    fn session_lock_is_async() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (_, data) = store.get_or_create(None);
        tokio_test::block_on(async {
            let guard = data.lock().await;
            assert!(guard.documents.is_empty());
        });
    }
}
