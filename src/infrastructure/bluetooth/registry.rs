//! Session Registry
//!
//! Insertion-ordered map from device name to [`DieSession`], at most one
//! session per name.

use crate::infrastructure::bluetooth::session::DieSession;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Vec<DieSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DieSession> {
        self.sessions.iter().find(|s| s.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DieSession> {
        self.sessions.iter_mut().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a session. If one with the same name exists it is handed back and
    /// the registry is left untouched.
    pub fn insert(&mut self, session: DieSession) -> Result<(), DieSession> {
        if self.contains(session.name()) {
            return Err(session);
        }
        self.sessions.push(session);
        Ok(())
    }

    /// Remove every session, in insertion order
    pub fn drain(&mut self) -> Vec<DieSession> {
        std::mem::take(&mut self.sessions)
    }

    /// Remove sessions disconnected and idle for longer than `threshold`
    pub fn sweep_stale(&mut self, now: Instant, threshold: Duration) -> Vec<DieSession> {
        let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sessions)
            .into_iter()
            .partition(|s| s.is_stale(now, threshold));
        self.sessions = kept;
        stale
    }

    /// (connected, total)
    pub fn counts(&self) -> (usize, usize) {
        let connected = self.sessions.iter().filter(|s| s.is_connected()).count();
        (connected, self.sessions.len())
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.name().to_string()).collect()
    }
}
