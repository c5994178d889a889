//! # docchat
//!
//! Document chat over uploaded PDFs, Word files, and images.
//!
//! Uploaded files are reduced to text, split into overlapping chunks, and
//! held in an in-memory store. Questions are answered by ranking chunks
//! with a lexical relevance score and handing the best ones to a text
//! generator with instructions to answer only from that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Upload  │──▶│   Extract    │──▶│ InMemoryStore │
//! │ PDF/DOCX │   │ Chunk+Index  │   │  RwLock<..>   │
//! └──────────┘   └──────────────┘   └───────┬───────┘
//!                                           │ search
//!                                   ┌───────▼───────┐   ┌───────────┐
//!                                   │   Retriever   │──▶│ Generator │
//!                                   │ basic/kg/hyb  │   │  (Gemini) │
//!                                   └───────┬───────┘   └───────────┘
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   HTTP   │
//!                 │(docchat) │        │  (axum)  │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Overlapping, sentence-aware text chunking |
//! | [`relevance`] | Keyword extraction and lexical scoring |
//! | [`store`] | Document store trait and in-memory backend |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`ingest`] | File → document + chunks pipeline |
//! | [`generation`] | Text-generation providers |
//! | [`rag`] | Retrieval strategies and prompt assembly |
//! | [`memory`] | Per-session conversation history |
//! | [`safety`] | Message screening |
//! | [`server`] | HTTP API |
//! | [`commands`] | One-shot CLI commands |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod memory;
pub mod models;
pub mod rag;
pub mod relevance;
pub mod safety;
pub mod server;
pub mod store;
