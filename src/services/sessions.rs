use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime, Utc};

use crate::models::ConfirmationSession;

struct SessionEntry {
    session: ConfirmationSession,
    created_at: NaiveDateTime,
}

impl SessionEntry {
    /// Latest of creation and the last code issued through the session.
    fn last_active(&self) -> NaiveDateTime {
        self.session
            .pending
            .as_ref()
            .map(|p| p.issued_at.max(self.created_at))
            .unwrap_or(self.created_at)
    }

    fn is_expired_at(&self, now: NaiveDateTime, ttl: Duration) -> bool {
        self.last_active() + ttl <= now
    }
}

/// In-memory confirmation sessions keyed by an opaque session id.
///
/// Entries expire `ttl` after their last activity. Concurrent writers to the
/// same session are last-writer-wins; [`SessionStore::update`] never brings a
/// removed or expired session back.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Opens a session bound to `booking_id` and returns its id.
    pub fn create(&self, booking_id: &str) -> String {
        let now = now();
        let id = uuid::Uuid::new_v4().to_string();

        let mut sessions = self.lock();
        sessions.retain(|_, entry| !entry.is_expired_at(now, self.ttl));
        sessions.insert(
            id.clone(),
            SessionEntry {
                session: ConfirmationSession::for_booking(booking_id),
                created_at: now,
            },
        );
        id
    }

    /// Unknown or expired ids load as an empty session.
    pub fn load(&self, id: &str) -> ConfirmationSession {
        let mut sessions = self.lock();
        if !self.drop_if_expired(&mut sessions, id) {
            return ConfirmationSession::default();
        }
        sessions
            .get(id)
            .map(|entry| entry.session.clone())
            .unwrap_or_default()
    }

    /// Applies `f` to a live session. Returns `false` when the id is unknown or expired.
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ConfirmationSession),
    {
        let mut sessions = self.lock();
        if !self.drop_if_expired(&mut sessions, id) {
            return false;
        }
        match sessions.get_mut(id) {
            Some(entry) => {
                f(&mut entry.session);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(now())
    }

    pub fn evict_expired_at(&self, now: NaiveDateTime) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired_at(now, self.ttl));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `id` if it has expired. Returns whether a live entry remains.
    fn drop_if_expired(&self, sessions: &mut HashMap<String, SessionEntry>, id: &str) -> bool {
        let expired = match sessions.get(id) {
            Some(entry) => entry.is_expired_at(now(), self.ttl),
            None => return false,
        };
        if expired {
            sessions.remove(id);
        }
        !expired
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        // The map holds no invariants a panicking writer could break.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
