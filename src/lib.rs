//! # Document Concierge
//!
//! Retrieval-augmented chat over a folder of internal documents and a
//! fixed list of web pages.
//!
//! Sources are loaded, normalized, chunked and embedded once when a
//! session starts. Each chat turn then rewrites the user's input against
//! the conversation so far, retrieves the nearest chunks and answers in
//! one of two modes: **search** (point at the most relevant documents) or
//! **inquiry** (answer from them and cite sources).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Sources    │──▶│ Normalize+Chunk  │──▶│  Embed+Index │
//! │  files/web   │   │                  │   │  (Retriever) │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  │ per turn
//!          ┌────────────┐   ┌────────────┐   ┌─────▼──────┐
//!          │   Render   │◀──│  Pipeline  │◀──│  Rewrite   │
//!          └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Startup and turn error types |
//! | [`logging`] | Tracing subscriber setup |
//! | [`sources`] | Directory walk and loader registry |
//! | [`extract`] | PDF and OOXML text extraction |
//! | [`web`] | Web page loading |
//! | [`normalize`] | Platform-conditional text canonicalization |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index and retriever |
//! | [`ingest`] | Load → normalize → chunk, `index` command |
//! | [`llm`] | Chat model abstraction |
//! | [`prompts`] | Prompt templates |
//! | [`rewrite`] | History-aware query rewriting |
//! | [`page`] | Page-number resolution |
//! | [`pipeline`] | Per-turn retrieval and answer |
//! | [`session`] | Session context |
//! | [`render`] | Terminal rendering |
//! | [`chat`] | `ask` and `chat` commands |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod page;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod rewrite;
pub mod session;
pub mod sources;
pub mod web;
