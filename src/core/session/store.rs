// src/core/session/store.rs
use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{Session, SessionError};

#[derive(Debug, Clone, Copy)]
pub enum SessionKey<'a> {
    Id(&'a str),
    Subject(&'a str),
}

/// In-memory registry of verification sessions, indexed by session id and
/// by subject. Only a session's own timer mutates its record.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    by_id: HashMap<String, Session>,
    by_subject: HashMap<String, String>,
}

impl StoreInner {
    fn active_for(&self, subject_id: &str, now: Instant) -> Option<&Session> {
        self.by_subject
            .get(subject_id)
            .and_then(|id| self.by_id.get(id))
            .filter(|session| !session.is_terminal() && !session.is_expired(now))
    }

    fn unique_id(&self, subject_id: &str) -> String {
        let base = format!("verify-{}-{}", subject_id, Utc::now().timestamp_millis());
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.by_id.contains_key(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn unlink(&mut self, session_id: &str) -> Option<Session> {
        let session = self.by_id.remove(session_id)?;
        // a newer session may already own the subject slot
        if self.by_subject.get(&session.subject_id).map(String::as_str) == Some(session_id) {
            self.by_subject.remove(&session.subject_id);
        }
        Some(session)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session in `Initiated`. Fails if the subject already has a
    /// live (non-terminal, unexpired) session.
    pub fn create(&self, subject_id: &str, timeout: Duration) -> Result<Session, SessionError> {
        self.create_unless(subject_id, timeout, |_| false)
    }

    /// Like `create`, but refuses with `AlreadyVerified` when `verified`
    /// holds for the subject. The check runs under the store's write lock.
    pub fn create_unless(
        &self,
        subject_id: &str,
        timeout: Duration,
        verified: impl FnOnce(&str) -> bool,
    ) -> Result<Session, SessionError> {
        let mut inner = self.inner.write();

        if verified(subject_id) {
            return Err(SessionError::AlreadyVerified(subject_id.to_string()));
        }

        if let Some(active) = inner.active_for(subject_id, Instant::now()) {
            return Err(SessionError::AlreadyActive {
                session_id: active.session_id.clone(),
            });
        }

        let session_id = inner.unique_id(subject_id);
        let session = Session::new(session_id.clone(), subject_id.to_string(), timeout);

        inner.by_subject.insert(subject_id.to_string(), session_id.clone());
        inner.by_id.insert(session_id.clone(), session.clone());

        debug!(%session_id, subject = subject_id, "Session created");
        Ok(session)
    }

    pub fn get(&self, key: SessionKey<'_>) -> Option<Session> {
        let inner = self.inner.read();
        match key {
            SessionKey::Id(id) => inner.by_id.get(id).cloned(),
            SessionKey::Subject(subject) => inner
                .by_subject
                .get(subject)
                .and_then(|id| inner.by_id.get(id))
                .cloned(),
        }
    }

    /// Applies `f` to the stored session, if it still exists.
    pub fn update<T>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut inner = self.inner.write();
        inner.by_id.get_mut(session_id).map(f)
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let removed = self.inner.write().unlink(session_id);
        if removed.is_some() {
            debug!(%session_id, "Session removed");
        }
        removed
    }

    /// Removes the session only if `predicate` holds, atomically with the check.
    pub fn remove_if(
        &self,
        session_id: &str,
        predicate: impl FnOnce(&Session) -> bool,
    ) -> Option<Session> {
        let mut inner = self.inner.write();
        match inner.by_id.get(session_id) {
            Some(session) if predicate(session) => inner.unlink(session_id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
