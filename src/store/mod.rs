//! Document storage abstraction.
//!
//! The [`Store`] trait defines everything the retrieval strategies and the
//! HTTP layer need from a document index. [`memory::InMemoryStore`] is the
//! only backend: the service keeps no state across restarts.
//!
//! Implementations must be `Send + Sync` and must make each mutation
//! atomic with respect to concurrent searches.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, SearchHit};

pub use memory::InMemoryStore;

/// Abstract document index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add_document`](Store::add_document) | Register a document and index its chunks |
/// | [`search`](Store::search) | Rank chunks of selected documents against a query |
/// | [`delete_document`](Store::delete_document) | Remove a document and all its chunks |
/// | [`list_documents`](Store::list_documents) | All documents in insertion order |
/// | [`get_document`](Store::get_document) | One document by id |
#[async_trait]
pub trait Store: Send + Sync {
    /// Register `document` with `chunks`. An existing document with the
    /// same id is replaced, and all of its previous chunks are dropped.
    async fn add_document(&self, document: Document, chunks: Vec<Chunk>) -> Result<()>;

    /// Rank chunks owned by `document_ids` against `query`.
    ///
    /// Returns at most `top_k` hits, sorted by descending score with ties
    /// kept in candidate order. Chunks scoring `0.0` are never returned.
    /// Unknown ids contribute nothing; an empty id list yields no hits.
    async fn search(
        &self,
        query: &str,
        document_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Remove a document and its chunks. Unknown ids are a no-op.
    async fn delete_document(&self, document_id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;

    async fn document_count(&self) -> Result<usize>;
}
