//! Request handling shared by the HTTP service and the console.
//!
//! Each caller (an HTTP client id, or the console) is bound to at most one
//! session. Binding happens only through [`ChatService::create_session`] or
//! [`ChatService::resume_session`]; sending while unbound is an error.

use domain::{ChatError, ChatResult, InferenceEngine, SessionId, Turn};
use infrastructure::session_store::SessionStore;
use shared::utils::preview;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Reply returned for blank input; the engine is not invoked.
pub const EMPTY_MESSAGE_REPLY: &str = "⚠️ Empty message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: SessionId,
    pub filename: String,
}

impl From<SessionId> for CreatedSession {
    fn from(id: SessionId) -> Self {
        Self {
            id,
            filename: id.filename(),
        }
    }
}

pub struct ChatService<E> {
    engine: E,
    store: SessionStore,
    bindings: RwLock<HashMap<String, SessionId>>,
}

impl<E: InferenceEngine> ChatService<E> {
    pub fn new(engine: E, store: SessionStore) -> Self {
        Self {
            engine,
            store,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn active_session(&self, caller: &str) -> Option<SessionId> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(caller)
            .copied()
    }

    /// Relay `message` to the engine and record the exchange.
    ///
    /// `session` overrides the caller's binding for this request only. The
    /// engine runs before any session lock is taken.
    pub async fn send_message(
        &self,
        caller: &str,
        message: &str,
        session: Option<SessionId>,
    ) -> ChatResult<String> {
        let text = message.trim();
        if text.is_empty() {
            tracing::debug!(caller, "empty message short-circuited");
            return Ok(EMPTY_MESSAGE_REPLY.to_string());
        }

        let id = session
            .or_else(|| self.active_session(caller))
            .ok_or(ChatError::NoActiveSession)?;
        if !self.store.exists(id) {
            return Err(ChatError::NotFound(id.filename()));
        }

        tracing::info!(caller, session = %id, message = %preview(text, 60), "relaying message");
        let reply = self.engine.generate(text).await?;
        if reply.is_empty() {
            tracing::warn!(session = %id, "engine produced no reply");
        }
        self.store.append_turn(id, text, &reply).await?;
        Ok(reply)
    }

    pub fn list_sessions(&self) -> ChatResult<Vec<String>> {
        self.store.list_sessions()
    }

    pub fn get_session(&self, filename: &str) -> ChatResult<String> {
        self.store.load_session(session_id_from_filename(filename)?)
    }

    /// Turns recorded so far in `id`.
    pub async fn turns(&self, id: SessionId) -> ChatResult<Vec<Turn>> {
        Ok(self.store.snapshot(id).await?.turns().to_vec())
    }

    pub async fn create_session(&self, caller: &str) -> ChatResult<CreatedSession> {
        let id = self.store.create_session().await?;
        self.bind(caller, id);
        Ok(id.into())
    }

    pub fn resume_session(&self, caller: &str, filename: &str) -> ChatResult<CreatedSession> {
        let id = session_id_from_filename(filename)?;
        if !self.store.exists(id) {
            return Err(ChatError::NotFound(filename.to_string()));
        }
        self.bind(caller, id);
        Ok(id.into())
    }

    /// Delete a session and unbind every caller that was using it.
    pub async fn delete_session(&self, filename: &str) -> ChatResult<String> {
        let id = session_id_from_filename(filename)?;
        self.store.delete_session(id).await?;
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, bound| *bound != id);
        Ok(format!("{filename} deleted"))
    }

    fn bind(&self, caller: &str, id: SessionId) {
        tracing::debug!(caller, session = %id, "caller bound to session");
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(caller.to_string(), id);
    }
}

/// Map a transcript filename to its session, treating anything that is not a
/// transcript name as absent.
pub fn session_id_from_filename(filename: &str) -> ChatResult<SessionId> {
    SessionId::from_filename(filename).ok_or_else(|| ChatError::NotFound(filename.to_string()))
}
