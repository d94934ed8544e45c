//! Session Registry
//!
//! Tracks the open real-time sessions. Owned by the application state and
//! shared by the connection handlers; membership is guarded by a `RwLock`
//! because handlers run on a multi-threaded runtime.

use chrono::{DateTime, Utc};
use emo_common::realtime::OutboundMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Connecting => 0,
            SessionState::Open => 1,
            SessionState::Closed => 2,
        }
    }
}

/// Outbound queue of a session has been dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session {0} is closed")]
pub struct SessionClosed(pub Uuid);

/// One real-time connection
///
/// Cloning yields another handle to the same session. Messages are queued on
/// an unbounded channel drained by the connection's writer task, so sending
/// never waits on the socket.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    opened_at: DateTime<Utc>,
}

impl Session {
    /// New session in `Connecting` state
    ///
    /// # Arguments
    /// * `outbound` - Queue drained into the connection
    /// * `cancel` - Cancelled when the connection goes away
    pub fn new(outbound: mpsc::UnboundedSender<OutboundMessage>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbound,
            cancel,
            state: Arc::new(AtomicU8::new(SessionState::Connecting.as_u8())),
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Token cancelled when the connection closes
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Queue a message for this connection
    pub fn send(&self, message: OutboundMessage) -> Result<(), SessionClosed> {
        self.outbound.send(message).map_err(|_| SessionClosed(self.id))
    }
}

/// Set of currently open sessions
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session
    ///
    /// Returns false (and does nothing) for a session already `Closed`.
    pub async fn register(&self, session: Session) -> bool {
        if session.state() == SessionState::Closed {
            debug!(session_id = %session.id(), "Refusing to register closed session");
            return false;
        }

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
        info!(total = sessions.len(), "Real-time session registered");
        true
    }

    /// Remove a session, returning it if it was present
    pub async fn unregister(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id);
        if removed.is_some() {
            info!(session_id = %id, total = sessions.len(), "Real-time session unregistered");
        }
        removed
    }

    /// Send a message to every registered session
    ///
    /// Iterates a snapshot taken under the read lock. A failed send is logged
    /// and skipped; the dead session is left for its own handler to remove.
    /// Returns the number of sessions the message was queued for.
    pub async fn broadcast(&self, message: &OutboundMessage) -> usize {
        let snapshot: Vec<Session> = self.sessions.read().await.values().cloned().collect();

        let mut delivered = 0;
        for session in &snapshot {
            match session.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(error = %e, "Broadcast skipped closed session"),
            }
        }

        debug!(
            kind = message.kind(),
            delivered,
            total = snapshot.len(),
            "Broadcast complete"
        );
        delivered
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
