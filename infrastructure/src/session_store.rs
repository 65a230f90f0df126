//! File-backed session store.
//!
//! Every session lives in `<root>/chat_history_<N>.md`. Identifiers are derived
//! from the files present on disk (highest suffix + 1), so they survive
//! restarts without any extra metadata. Within one process an allocation lock
//! and a high-water mark keep identifiers strictly increasing even when the
//! newest session is deleted.
//!
//! Appends to one session are serialized by a per-session lock; different
//! sessions never contend. Transcript files are always replaced atomically.

use crate::atomic_file::{create_atomic, write_atomic};
use domain::session::NEW_CHAT_HEADER;
use domain::{ChatError, ChatResult, Session, SessionId};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;

const MAX_ALLOCATION_ATTEMPTS: usize = 3;

/// `None` until the session is first touched in this process.
type Slot = Arc<Mutex<Option<Session>>>;

pub struct SessionStore {
    root: PathBuf,
    last_allocated: Mutex<Option<SessionId>>,
    slots: StdMutex<HashMap<SessionId, Slot>>,
}

impl SessionStore {
    pub fn open(root: impl Into<PathBuf>) -> ChatResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "session store opened");
        Ok(Self {
            root,
            last_allocated: Mutex::new(None),
            slots: StdMutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: SessionId) -> PathBuf {
        self.root.join(id.filename())
    }

    pub fn exists(&self, id: SessionId) -> bool {
        self.path_for(id).is_file()
    }

    /// Allocate the next identifier and reserve its file with the
    /// `# New Chat` header.
    pub async fn create_session(&self) -> ChatResult<SessionId> {
        let mut last_allocated = self.last_allocated.lock().await;

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let highest = self.scan_ids()?.last().copied().max(*last_allocated);
            let id = highest.map_or(SessionId::FIRST, |h| h.next());

            match create_atomic(&self.path_for(id), NEW_CHAT_HEADER.as_bytes()) {
                Ok(()) => {
                    *last_allocated = Some(id);
                    self.slot(id).lock().await.replace(Session::new(id));
                    tracing::info!(session = %id, "session created");
                    return Ok(id);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    *last_allocated = Some(id);
                    tracing::warn!(session = %id, attempt, "session id taken concurrently, rescanning");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ChatError::Conflict(format!(
            "no free session id after {MAX_ALLOCATION_ATTEMPTS} attempts"
        )))
    }

    /// Append a user/assistant pair and rewrite the transcript.
    ///
    /// The in-memory session only advances once the file has been replaced,
    /// so memory and disk never disagree.
    pub async fn append_turn(
        &self,
        id: SessionId,
        user_text: &str,
        assistant_text: &str,
    ) -> ChatResult<()> {
        let slot = self.slot(id);
        let mut current = slot.lock().await;

        let mut session = match current.as_ref() {
            Some(session) => session.clone(),
            None => self.read_session(id).inspect_err(|e| self.forget_missing(id, &slot, e))?,
        };
        session.add_exchange(user_text, assistant_text);
        write_atomic(&self.path_for(id), session.render().as_bytes())?;

        tracing::debug!(session = %id, turns = session.turns().len(), "transcript rewritten");
        *current = Some(session);
        Ok(())
    }

    /// Session filenames currently on disk, ordered by identifier.
    pub fn list_sessions(&self) -> ChatResult<Vec<String>> {
        Ok(self.scan_ids()?.into_iter().map(|id| id.filename()).collect())
    }

    /// Rendered transcript as currently stored.
    pub fn load_session(&self, id: SessionId) -> ChatResult<String> {
        fs::read_to_string(self.path_for(id)).map_err(|e| not_found_or(e, id))
    }

    /// Parsed copy of the session, for callers that need the turns.
    pub async fn snapshot(&self, id: SessionId) -> ChatResult<Session> {
        let slot = self.slot(id);
        let mut current = slot.lock().await;
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }
        let session = self
            .read_session(id)
            .inspect_err(|e| self.forget_missing(id, &slot, e))?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Remove the transcript. The identifier stays retired.
    pub async fn delete_session(&self, id: SessionId) -> ChatResult<()> {
        // Lock order is allocation before slot, same as create_session.
        let mut last_allocated = self.last_allocated.lock().await;
        let slot = self.slot(id);
        let mut current = slot.lock().await;

        let removed = fs::remove_file(self.path_for(id));
        *current = None;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        removed.map_err(|e| not_found_or(e, id))?;

        *last_allocated = (*last_allocated).max(Some(id));
        tracing::info!(session = %id, "session deleted");
        Ok(())
    }

    fn slot(&self, id: SessionId) -> Slot {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }

    /// Drop the slot created for an id that has no transcript, unless another
    /// caller has already replaced it.
    fn forget_missing(&self, id: SessionId, slot: &Slot, err: &ChatError) {
        if !err.is_not_found() {
            return;
        }
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(&id);
        }
    }

    fn read_session(&self, id: SessionId) -> ChatResult<Session> {
        let transcript = self.load_session(id)?;
        Session::from_transcript(id, &transcript)
    }

    fn scan_ids(&self) -> ChatResult<Vec<SessionId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(SessionId::from_filename) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

fn not_found_or(e: io::Error, id: SessionId) -> ChatError {
    if e.kind() == io::ErrorKind::NotFound {
        ChatError::NotFound(id.filename())
    } else {
        ChatError::Io(e)
    }
}
