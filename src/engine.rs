//! Condense-question chat engine over a [`RetrievalIndex`].
//!
//! Each question is first rewritten into a standalone question using the
//! prior conversation, then used to retrieve document chunks, and finally
//! answered by the chat backend with those chunks as context.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ChatConfig;
use crate::index::{RetrievalIndex, ScoredChunk};
use crate::llm::{ChatMessage, ChatRequest, LanguageModel};
use crate::models::{Role, Turn};

const CONDENSE_PROMPT: &str = "Given a conversation (between Human and Assistant) and a follow up \
message from Human, rewrite the message to be a standalone question that captures all relevant \
context from the conversation.";

/// Answer plus the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub response: String,
    pub sources: Vec<ScoredChunk>,
}

pub struct ChatEngine {
    index: RetrievalIndex,
    llm: Arc<dyn LanguageModel>,
    config: ChatConfig,
    top_k: usize,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("index", &self.index)
            .field("model", &self.config.model)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl ChatEngine {
    pub fn new(
        index: RetrievalIndex,
        llm: Arc<dyn LanguageModel>,
        config: ChatConfig,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            llm,
            config,
            top_k,
        }
    }

    /// Answer `question` given the turns that preceded it.
    pub async fn chat(&self, question: &str, history: &[Turn]) -> Result<EngineResponse> {
        let standalone = self.condense(question, history).await?;
        let sources = self
            .index
            .retrieve(&standalone, self.top_k)
            .await
            .context("retrieval failed")?;

        let messages = vec![
            ChatMessage::system(&self.config.system_prompt),
            ChatMessage::system(context_message(&sources)),
            ChatMessage::user(&standalone),
        ];
        let response = self
            .llm
            .chat(&ChatRequest::new(&self.config, messages))
            .await?;

        Ok(EngineResponse {
            response: response.trim().to_string(),
            sources,
        })
    }

    async fn condense(&self, question: &str, history: &[Turn]) -> Result<String> {
        let transcript = history_transcript(history);
        if transcript.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = format!(
            "{CONDENSE_PROMPT}\n\n<Chat History>\n{transcript}\n\n<Follow Up Message>\n{question}\n\n<Standalone question>"
        );
        let rewritten = self
            .llm
            .chat(&ChatRequest::new(
                &self.config,
                vec![ChatMessage::user(prompt)],
            ))
            .await
            .context("question condensing failed")?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            tracing::debug!(standalone = rewritten, "condensed follow-up question");
            Ok(rewritten.to_string())
        }
    }
}

/// Render history as `Human:` / `Assistant:` lines. The leading run of
/// assistant-only turns (greeting, upload notices) carries no question
/// context, so nothing is rendered until the first user turn.
fn history_transcript(history: &[Turn]) -> String {
    history
        .iter()
        .skip_while(|t| t.role() == Role::Assistant)
        .map(|t| match t.role() {
            Role::User => format!("Human: {}", t.content()),
            Role::Assistant => format!("Assistant: {}", t.content()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_message(sources: &[ScoredChunk]) -> String {
    let mut out = String::from("Context information from the document is below.\n---------------------\n");
    for s in sources {
        out.push_str(&s.chunk.text);
        out.push_str("\n\n");
    }
    out.push_str(
        "---------------------\nGiven the context information and not prior knowledge, answer the question.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_only_history_is_empty() {
        let history = vec![Turn::assistant("hello there"), Turn::assistant("doc loaded")];
        assert_eq!(history_transcript(&history), "");
    }

    #[test]
    fn history_labels_roles() {
        let history = vec![
            Turn::assistant("greeting"),
            Turn::user("who wrote it?"),
            Turn::assistant("Ada."),
        ];
        assert_eq!(
            history_transcript(&history),
            "Human: who wrote it?\nAssistant: Ada."
        );
    }

    #[test]
    fn context_message_has_header_without_sources() {
        let msg = context_message(&[]);
        assert!(msg.starts_with("Context information"));
    }
}
