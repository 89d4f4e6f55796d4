use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::outcome::PipelineError;
use crate::types::{Provider, ResourceDescriptor};

pub const DEFAULT_CAPACITY: usize = 32;

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| {
        tracing::warn!("session registry mutex poisoned, recovering");
        e.into_inner()
    })
}

/// Results of one search call, addressable by id from a later play/download call.
#[derive(Debug, Clone)]
pub struct SearchSession {
    pub id: String,
    pub provider: Provider,
    pub query: String,
    pub results: Vec<ResourceDescriptor>,
    pub created_at: DateTime<Utc>,
}

/// Bounded registry of recent search sessions. Oldest sessions are evicted first.
pub struct SessionRegistry {
    sessions: Mutex<VecDeque<SearchSession>>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, provider: Provider, query: &str, results: Vec<ResourceDescriptor>) -> String {
        let id = session_id();
        let mut sessions = lock_or_recover(&self.sessions);
        while sessions.len() >= self.capacity {
            sessions.pop_front();
        }
        sessions.push_back(SearchSession {
            id: id.clone(),
            provider,
            query: query.to_string(),
            results,
            created_at: Utc::now(),
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<SearchSession> {
        lock_or_recover(&self.sessions)
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// The `index`-th result of a session, checked against the expected provider.
    pub fn pick(
        &self,
        id: &str,
        index: usize,
        provider: Provider,
    ) -> Result<ResourceDescriptor, PipelineError> {
        let session = self.get(id).ok_or_else(|| {
            PipelineError::invalid_input(format!("unknown or expired session_id '{id}'"))
        })?;
        if session.provider != provider {
            return Err(PipelineError::invalid_input(format!(
                "session '{id}' holds {} results, not {provider}",
                session.provider
            )));
        }
        tracing::debug!(
            session = id,
            query = %session.query,
            age_secs = (Utc::now() - session.created_at).num_seconds(),
            index,
            "resolving from search session"
        );
        session.results.get(index).cloned().ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "index {index} is out of range; session '{id}' has {} result(s)",
                session.results.len()
            ))
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock_or_recover(&self.sessions).len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
