//! # Writer Helper
//!
//! Chat with an uploaded document, or get writing feedback on free text,
//! through a hosted OpenAI-compatible model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐   ┌────────────┐
//! │  Upload  │──▶│    Ingest    │──▶│ RetrievalIndex │──▶│ ChatEngine │
//! │ pdf/txt  │   │ fragments    │   │ chunks+vectors │   │ condense Q │
//! └──────────┘   └──────────────┘   └────────────────┘   └─────┬──────┘
//!                                                              │
//! ┌──────────┐   ┌──────────────┐  document loaded             │
//! │   Turn   │──▶│  Dispatcher  │──────────────────────────────┘
//! └──────────┘   └──────┬───────┘
//!                       │ no document
//!                       ▼
//!                 LanguageModel::complete
//! ```
//!
//! Replies are appended to the session's [`session::Conversation`], which the
//! HTTP server and the terminal chat render after every turn.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`models`] | Turns, fragments, chunks |
//! | [`ingest`] | Upload → text fragments (PDF, plain text) |
//! | [`chunk`] | Paragraph-boundary chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory retrieval index |
//! | [`llm`] | Completion / chat API client |
//! | [`engine`] | Condense-question chat engine |
//! | [`session`] | Conversation state and the session registry |
//! | [`dispatch`] | Turn routing and uploads |
//! | [`server`] | HTTP API |
//! | [`repl`] | Terminal chat |

pub mod chunk;
pub mod config;
pub mod dispatch;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod repl;
pub mod server;
pub mod session;
