//! Core data models used throughout Writer Helper.
//!
//! These types represent the transcript turns, extracted fragments, and
//! indexed chunks that flow through the upload and chat pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Transcript label, as shown to the person chatting.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

/// One role-tagged message in the transcript. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A unit of extracted document text (one PDF page, or a whole text file).
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub index: usize,
    pub text: String,
}

/// A piece of a fragment, sized for retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub fragment_index: usize,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Metadata about the document currently attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedDocument {
    pub name: String,
    pub content_type: String,
    /// SHA-256 of the uploaded bytes.
    pub fingerprint: String,
    pub fragment_count: usize,
    pub chunk_count: usize,
}
