//! Documentation chat server.
//!
//! Docent answers questions about a documentation corpus by retrieving the
//! passages most similar to the user's query and streaming a model reply
//! grounded in them. A second persona runs a teach-back exercise: the model
//! coaches, asking a question drawn from the documentation, the user explains
//! the topic back, and the model grades the explanation against a rubric.
//!
//! # Request flow
//!
//! 1. Greetings are answered from a fixed reply list without touching any
//!    upstream service.
//! 2. Otherwise the query is embedded, the top passages above the similarity
//!    threshold are fetched from SQLite ([sqlite-vec](https://github.com/asg017/sqlite-vec)),
//!    and a persona-specific system prompt is composed around them.
//! 3. The completion is streamed to the client as plain text. When it
//!    finishes, the conversation is handed to a long-term memory service.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration plus environment overrides
//! - [`db`]: SQLite schema, migrations, and the connection pool
//! - [`documents`]: chunking, storing, and similarity search over passages
//! - [`embedding`] / [`completion`]: OpenAI-compatible provider clients
//! - [`chat`]: greetings, personas, prompt composition, the response pipeline
//! - [`memory`] / [`interactions`]: per-user conversation memory and the Q&A log
//! - [`server`]: the axum HTTP surface

pub mod chat;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod interactions;
pub mod memory;
pub mod retrieval;
pub mod server;
