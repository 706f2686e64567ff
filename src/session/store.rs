//! In-memory session registry with deterministic expiry
//!
//! All session state lives behind one mutex; the lock is never held across
//! an await, so message processing and the background sweep serialize on
//! individual map operations only.

use super::{Session, EXPIRED_MARKER_TTL, SWEEP_INTERVAL};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Outcome of looking up a session id
#[derive(Debug)]
pub enum Resolved {
    /// Live session; `last_active_at` has been refreshed
    Active(Session),
    /// Session existed and timed out (or was swept); caller must reply
    /// with an explicit expiry message
    Expired,
    /// Never seen (or marker aged out); caller may create a fresh session
    Missing,
}

#[derive(Default)]
struct Inner {
    live: HashMap<String, Session>,
    /// Recently expired ids, with the time they were marked
    expired: HashMap<String, Instant>,
    /// Per-id locks serializing a full resolve/mutate/commit span
    guards: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Registry of all live sessions
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock guarding message processing for one session id. Holding the
    /// returned mutex across resolve/mutate/commit keeps two in-flight
    /// messages for the same session from clobbering each other's writes.
    pub fn guard(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inner = self.lock();
        Arc::clone(inner.guards.entry(session_id.to_string()).or_default())
    }

    /// Look up a session, applying lazy expiry
    pub fn resolve(&self, session_id: &str) -> Resolved {
        let now = Instant::now();
        let mut inner = self.lock();

        if let Some(marked_at) = inner.expired.get(session_id) {
            if now.duration_since(*marked_at) <= EXPIRED_MARKER_TTL {
                return Resolved::Expired;
            }
            inner.expired.remove(session_id);
        }

        match inner.live.get_mut(session_id) {
            Some(session) if session.is_idle_expired(now) => {
                inner.live.remove(session_id);
                inner.expired.insert(session_id.to_string(), now);
                Resolved::Expired
            }
            Some(session) => {
                session.last_active_at = now;
                Resolved::Active(session.clone())
            }
            None => Resolved::Missing,
        }
    }

    /// Insert a fresh session in the initial state. A no-op if the id is
    /// already live; the existing session is returned instead.
    pub fn create(&self, session_id: &str) -> Session {
        let mut inner = self.lock();
        inner
            .live
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .clone()
    }

    /// Write back a mutated session
    pub fn commit(&self, session: Session) {
        let mut inner = self.lock();
        inner.live.insert(session.id.clone(), session);
    }

    /// Explicit reset: drop the session and forget any expiry marker
    pub fn remove(&self, session_id: &str) {
        let mut inner = self.lock();
        inner.live.remove(session_id);
        inner.expired.remove(session_id);
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Expire idle sessions and age out stale expiry markers
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut inner = self.lock();

        let idle: Vec<String> = inner
            .live
            .iter()
            .filter(|(_, s)| s.is_idle_expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in idle {
            inner.live.remove(&id);
            inner.expired.insert(id.clone(), now);
            tracing::debug!(session_id = %id, "Session expired by sweep");
        }

        inner
            .expired
            .retain(|_, marked_at| now.duration_since(*marked_at) <= EXPIRED_MARKER_TTL);

        // Guards for ids no longer tracked anywhere can go once nobody
        // holds them.
        let Inner {
            live,
            expired,
            guards,
        } = &mut *inner;
        guards.retain(|id, guard| {
            Arc::strong_count(guard) > 1 || live.contains_key(id) || expired.contains_key(id)
        });
    }

    /// Run the periodic expiry sweep until the process exits
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; sweeping a fresh store is
            // a no-op.
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }
}
