//! Session registry
//!
//! Tracks open SSE sessions by id. Each session owns an inbound queue drained
//! by its worker task; the registry only holds the sending half.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SessionError;

/// Channel capacity for queued inbound messages
const INBOUND_CAPACITY: usize = 64;

/// Newtype for session IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending side of an open session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    inbound: mpsc::Sender<Value>,
}

impl SessionHandle {
    pub fn new(id: SessionId, inbound: mpsc::Sender<Value>) -> Self {
        Self { id, inbound }
    }

    /// Queue a message for the session worker without waiting.
    ///
    /// Fails with `Backlogged` when the queue is full and with
    /// `SessionNotFound` if the worker has already gone away.
    pub fn deliver(&self, message: Value) -> Result<(), SessionError> {
        self.inbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::Backlogged {
                session_id: self.id.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => SessionError::SessionNotFound {
                session_id: self.id.to_string(),
            },
        })
    }
}

/// Registry of open sessions
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    max_sessions: usize,
    /// Slots reserved by open sessions; always >= `sessions.len()`
    reserved: AtomicUsize,
}

/// Shared registry handle
pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
            reserved: AtomicUsize::new(0),
        }
    }

    /// Open a new session with a fresh id.
    ///
    /// Returns the id and the receiver the session worker drains.
    pub fn open(&self) -> Result<(SessionId, mpsc::Receiver<Value>), SessionError> {
        let (sender, receiver) = mpsc::channel(INBOUND_CAPACITY);
        let id = SessionId::generate();
        self.register(SessionHandle::new(id.clone(), sender))?;
        Ok((id, receiver))
    }

    /// Insert a session handle
    ///
    /// # Errors
    /// `CapacityExceeded` when the registry is full, `DuplicateSession` if the
    /// id is already registered.
    pub fn register(&self, handle: SessionHandle) -> Result<(), SessionError> {
        let limit = self.max_sessions;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| SessionError::CapacityExceeded { limit })?;

        match self.sessions.entry(handle.id.clone()) {
            Entry::Occupied(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                Err(SessionError::DuplicateSession {
                    session_id: handle.id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                debug!(session_id = %handle.id, "Registered SSE session");
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                debug!(session_id = %id, "Unregistered SSE session");
                true
            }
            None => false,
        }
    }

    /// Handle for an open session
    pub fn lookup(&self, id: &str) -> Option<SessionHandle> {
        self.sessions
            .get(&SessionId::from(id))
            .map(|entry| entry.value().clone())
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session, closing their queues
    pub fn clear(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.remove(id);
        }
    }
}
