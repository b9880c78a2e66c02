//! In-memory per-session profile store.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::session::SessionId;

use super::model::StudentProfile;
use super::state::CollectionState;

/// What the store holds for a session.
///
/// A session is either still answering the profile questions or has a
/// completed profile, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEntry {
    Collecting(CollectionState),
    Ready(StudentProfile),
}

/// Coarse view of a session's phase, for logging and status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Collecting,
    Ready,
}

/// Owns every session's collection state or completed profile.
///
/// Lock hold times are a single map operation; callers never hold the lock
/// across an await.
#[derive(Debug, Default)]
pub struct ProfileStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting a profile from step 1, replacing whatever the
    /// session held before.
    pub async fn begin_session(&self, session: &SessionId) {
        self.sessions
            .write()
            .await
            .insert(session.clone(), SessionEntry::Collecting(CollectionState::new()));
    }

    /// Snapshot of the session's collection state, if it is collecting.
    pub async fn get_state(&self, session: &SessionId) -> Option<CollectionState> {
        match self.sessions.read().await.get(session) {
            Some(SessionEntry::Collecting(state)) => Some(state.clone()),
            _ => None,
        }
    }

    /// The session's completed profile, if any.
    pub async fn get_profile(&self, session: &SessionId) -> Option<StudentProfile> {
        match self.sessions.read().await.get(session) {
            Some(SessionEntry::Ready(profile)) => Some(profile.clone()),
            _ => None,
        }
    }

    /// Store a completed profile, dropping the collection state.
    pub async fn commit_profile(&self, session: &SessionId, profile: StudentProfile) {
        self.sessions
            .write()
            .await
            .insert(session.clone(), SessionEntry::Ready(profile));
    }

    /// Discard the profile (or partial answers) and restart collection.
    pub async fn reset_session(&self, session: &SessionId) {
        self.begin_session(session).await;
    }

    /// Remove everything held for the session.
    pub async fn end_session(&self, session: &SessionId) {
        self.sessions.write().await.remove(session);
    }

    /// Mutate the session's collection state in place.
    ///
    /// Returns `None` without calling `f` when the session is not collecting.
    pub async fn update_state<F, R>(&self, session: &SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut CollectionState) -> R,
    {
        match self.sessions.write().await.get_mut(session) {
            Some(SessionEntry::Collecting(state)) => Some(f(state)),
            _ => None,
        }
    }

    /// Current phase of the session, `None` if unknown.
    pub async fn phase(&self, session: &SessionId) -> Option<SessionPhase> {
        self.sessions.read().await.get(session).map(|entry| match entry {
            SessionEntry::Collecting(_) => SessionPhase::Collecting,
            SessionEntry::Ready(_) => SessionPhase::Ready,
        })
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
