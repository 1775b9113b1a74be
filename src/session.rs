//! Per-user session state: the transcript and the active chat engine.
//!
//! A [`Session`] is created on first interaction and dropped when the user
//! is done; nothing here outlives the process. [`SessionRegistry`] hands out
//! one isolated session per id, each behind its own lock so turns within a
//! session run one at a time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::ChatEngine;
use crate::models::{LoadedDocument, Turn};

/// Append-only transcript, never empty.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation with the assistant's greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::assistant(greeting)],
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> &Turn {
        // The greeting guarantees at least one turn.
        &self.turns[self.turns.len() - 1]
    }

    /// Markdown transcript with role labels, one turn per paragraph.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("**{}**: {}", t.role().label(), t.content()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Which path a new turn takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    NoDocument,
    DocumentLoaded,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    conversation: Conversation,
    engine: Option<ChatEngine>,
    document: Option<LoadedDocument>,
}

impl Session {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation: Conversation::new(greeting),
            engine: None,
            document: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        if self.engine.is_some() {
            Mode::DocumentLoaded
        } else {
            Mode::NoDocument
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn append(&mut self, turn: Turn) {
        self.conversation.append(turn);
    }

    pub fn engine(&self) -> Option<&ChatEngine> {
        self.engine.as_ref()
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    /// True when `fingerprint` matches the document already loaded.
    pub fn has_document(&self, fingerprint: &str) -> bool {
        self.engine.is_some()
            && self
                .document
                .as_ref()
                .is_some_and(|d| d.fingerprint == fingerprint)
    }

    /// Install a freshly built engine, replacing any previous one.
    pub fn attach_document(&mut self, document: LoadedDocument, engine: ChatEngine) {
        self.document = Some(document);
        self.engine = Some(engine);
    }
}

/// Owns every live session, keyed by id.
pub struct SessionRegistry {
    greeting: String,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self) -> (Uuid, Arc<Mutex<Session>>) {
        let session = Session::new(self.greeting.clone());
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.write().insert(id, handle.clone());
        tracing::info!(session = %id, "session created");
        (id, handle)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        self.read().get(id).cloned()
    }

    /// Tear a session down. Returns false if it did not exist.
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Arc<Mutex<Session>>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Arc<Mutex<Session>>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
