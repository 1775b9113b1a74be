//! Turn dispatch: routes each user turn to the document chat engine or the
//! raw completion endpoint, and handles document uploads.
//!
//! # Failure policy
//!
//! A failed model call never ends the session. The error is logged and the
//! assistant turn carries the configured fallback message instead. Nothing
//! is retried.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::engine::ChatEngine;
use crate::index::{build_index, ScoredChunk};
use crate::ingest::{essence, ingest, IngestError, MIME_PDF};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{LoadedDocument, Turn};
use crate::session::Session;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("turn text must not be empty")]
    EmptyTurn,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("document extraction task failed: {0}")]
    Extraction(#[from] tokio::task::JoinError),
    #[error("failed to build document index: {0:#}")]
    Index(anyhow::Error),
}

/// The assistant turn appended by [`Dispatcher::submit`], with the document
/// chunks it was grounded on (empty on the completion path or on fallback).
#[derive(Debug, Clone)]
pub struct Reply {
    pub turn: Turn,
    pub sources: Vec<ScoredChunk>,
}

/// What an upload did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// A new engine was built and attached.
    Loaded,
    /// The same bytes were already loaded; the existing engine is kept.
    Reused,
}

/// Shared, immutable services every session dispatches through.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            llm,
            embedder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Append a user turn and the assistant's reply. Returns the reply.
    pub async fn submit(&self, session: &mut Session, text: &str) -> Result<Reply, DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::EmptyTurn);
        }

        let history = session.conversation().all().to_vec();
        session.append(Turn::user(text));

        let mode = session.mode();
        let reply = match session.engine() {
            Some(engine) => engine
                .chat(text, &history)
                .await
                .map(|r| (r.response, r.sources)),
            None => self
                .llm
                .complete(&CompletionRequest::new(&self.config.completion, text))
                .await
                .map(|t| (t.trim().to_string(), Vec::new()))
                .map_err(anyhow::Error::from),
        };

        let (content, sources) = match reply {
            Ok((content, sources)) if !content.is_empty() => (content, sources),
            Ok(_) => {
                tracing::warn!(session = %session.id(), ?mode, "model returned an empty reply");
                (self.config.session.fallback_message.clone(), Vec::new())
            }
            Err(e) => {
                tracing::warn!(session = %session.id(), ?mode, error = ?e, "turn failed, using fallback reply");
                (self.config.session.fallback_message.clone(), Vec::new())
            }
        };

        tracing::debug!(session = %session.id(), ?mode, turns = session.conversation().len() + 1, "turn answered");

        let turn = Turn::assistant(content);
        session.append(turn.clone());
        Ok(Reply { turn, sources })
    }

    /// Ingest an upload, build its chat engine and attach it to the session.
    ///
    /// Failures leave the session (and its current engine) untouched.
    pub async fn upload(
        &self,
        session: &mut Session,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadOutcome, DispatchError> {
        let fingerprint = fingerprint(bytes);
        if session.has_document(&fingerprint) {
            tracing::debug!(session = %session.id(), name, "document already loaded, reusing engine");
            return Ok(UploadOutcome::Reused);
        }

        let fragments = if essence(content_type) == MIME_PDF {
            // PDF parsing is CPU-bound; keep it off the async workers.
            let bytes = bytes.to_vec();
            tokio::task::spawn_blocking(move || ingest(&bytes, MIME_PDF)).await??
        } else {
            ingest(bytes, content_type)?
        };
        let index = build_index(
            &fragments,
            self.embedder.clone(),
            self.config.chunking.max_tokens,
            self.config.embedding.batch_size,
        )
        .await
        .with_context(|| format!("indexing {}", name))
        .map_err(DispatchError::Index)?;

        let document = LoadedDocument {
            name: name.to_string(),
            content_type: essence(content_type),
            fingerprint,
            fragment_count: fragments.len(),
            chunk_count: index.len(),
        };
        let engine = ChatEngine::new(
            index,
            self.llm.clone(),
            self.config.chat.clone(),
            self.config.retrieval.top_k,
        );

        tracing::info!(
            session = %session.id(),
            name,
            content_type = %document.content_type,
            chunks = document.chunk_count,
            "document loaded"
        );
        session.attach_document(document, engine);
        session.append(Turn::assistant(format!(
            "Document `{}` uploaded. Please ask your question.",
            name
        )));

        Ok(UploadOutcome::Loaded)
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
        assert_eq!(fingerprint(b"").len(), 64);
    }
}
