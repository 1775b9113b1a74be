//! Shared fixtures for integration tests: a scripted language model and a
//! byte-built PDF.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use writer_helper::config::Config;
use writer_helper::dispatch::Dispatcher;
use writer_helper::embedding::DisabledProvider;
use writer_helper::llm::{ChatRequest, CompletionRequest, LanguageModel, LlmError};

/// Offline stand-in for the hosted model.
///
/// * `complete` answers `"Feedback: <prompt>"`.
/// * a condense request (single user message) answers the follow-up verbatim.
/// * an answer request echoes the retrieved context as `"ANSWER[<context>]"`.
#[derive(Default)]
pub struct ScriptedModel {
    pub completions: Mutex<Vec<CompletionRequest>>,
    pub chats: Mutex<Vec<ChatRequest>>,
    pub fail: bool,
}

impl ScriptedModel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn completion_calls(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn chat_calls(&self) -> usize {
        self.chats.lock().unwrap().len()
    }
}

const FOLLOW_UP: &str = "<Follow Up Message>\n";
const STANDALONE: &str = "\n\n<Standalone question>";

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.completions.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(LlmError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(format!("  Feedback: {}  ", request.prompt))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.chats.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(LlmError::Malformed("scripted failure".to_string()));
        }

        if request.messages.len() == 1 {
            let prompt = &request.messages[0].content;
            let start = prompt.find(FOLLOW_UP).map(|i| i + FOLLOW_UP.len());
            let end = prompt.find(STANDALONE);
            if let (Some(start), Some(end)) = (start, end) {
                return Ok(prompt[start..end].to_string());
            }
            return Ok(prompt.clone());
        }

        let context = request
            .messages
            .get(1)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("ANSWER[{}]", context))
    }
}

pub fn dispatcher_with(model: Arc<ScriptedModel>) -> Dispatcher {
    Dispatcher::new(Arc::new(Config::default()), model, Arc::new(DisabledProvider))
}

/// Minimal single-page PDF showing `phrase` in Helvetica.
pub fn pdf_with_phrase(phrase: &str) -> Vec<u8> {
    pdf_with_pages(&[phrase])
}

/// Minimal PDF with one page per entry of `pages`, each showing its text in
/// Helvetica. Objects are written first, then an xref with correct byte
/// offsets so pdf-extract can parse it.
///
/// Object layout: 1 catalog, 2 page tree, 3 font, then a page object and its
/// content stream for every page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let page_id = |i: usize| 4 + 2 * i;
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids,
            pages.len()
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id(i),
                page_id(i) + 1
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                page_id(i) + 1,
                content.len(),
                content
            )
            .as_bytes(),
        );
    }

    let size = offsets.len() + 1;
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", size).as_bytes());
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
