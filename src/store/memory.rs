//! In-memory [`Store`] implementation.
//!
//! Documents and their chunks live behind a single `tokio::sync::RwLock`,
//! so a mutation is never observed half-applied: `add_document` and
//! `delete_document` take the write lock, searches share the read lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{Chunk, Document, SearchHit};
use crate::relevance::{KeywordScorer, RelevanceScorer};

use super::Store;

struct StoredDocument {
    document: Document,
    chunks: Vec<Chunk>,
}

#[derive(Default)]
struct Index {
    documents: HashMap<String, StoredDocument>,
    /// Document ids in insertion order.
    order: Vec<String>,
}

/// In-memory document store with pluggable relevance scoring.
pub struct InMemoryStore {
    index: RwLock<Index>,
    scorer: Arc<dyn RelevanceScorer>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_scorer(Arc::new(KeywordScorer::default()))
    }

    pub fn with_scorer(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            scorer,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_document(&self, mut document: Document, chunks: Vec<Chunk>) -> Result<()> {
        let doc_id = document.id.clone();
        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.id = Chunk::key(&doc_id, i);
                c.document_id = doc_id.clone();
                c.metadata.index = i;
                c
            })
            .collect();
        document.chunk_count = chunks.len();

        let mut index = self.index.write().await;
        let replaced = index
            .documents
            .insert(doc_id.clone(), StoredDocument { document, chunks })
            .map(|old| old.chunks.len());

        match replaced {
            Some(old_chunks) => {
                tracing::debug!(document_id = %doc_id, old_chunks, "replaced existing document");
            }
            None => index.order.push(doc_id.clone()),
        }

        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        document_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if document_ids.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let keywords = self.scorer.keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().await;
        let mut seen = HashSet::new();
        let mut hits: Vec<SearchHit> = Vec::new();

        for doc_id in document_ids {
            if !seen.insert(doc_id.as_str()) {
                continue;
            }
            let Some(stored) = index.documents.get(doc_id) else {
                continue;
            };
            for chunk in &stored.chunks {
                let score = self.scorer.score(&chunk.text.to_lowercase(), &keywords);
                if score > 0.0 {
                    hits.push(SearchHit {
                        chunk: chunk.clone(),
                        document_name: stored.document.name.clone(),
                        score,
                    });
                }
            }
        }

        // `sort_by` is stable: equal scores keep candidate order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        tracing::debug!(query, keywords = ?keywords, hits = hits.len(), "store search");
        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<Document>> {
        let mut index = self.index.write().await;
        let removed = index.documents.remove(document_id);
        if removed.is_some() {
            index.order.retain(|id| id != document_id);
        }
        Ok(removed.map(|s| s.document))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let index = self.index.read().await;
        Ok(index
            .order
            .iter()
            .filter_map(|id| index.documents.get(id))
            .map(|s| s.document.clone())
            .collect())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let index = self.index.read().await;
        Ok(index
            .documents
            .get(document_id)
            .map(|s| s.document.clone()))
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.index.read().await.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    fn doc(id: &str, name: &str) -> Document {
        Document {
            id: id.to_string(),
            name: name.to_string(),
            kind: ContentKind::Pdf,
            content_preview: String::new(),
            chunk_count: 0,
            upload_date: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn chunks(doc_id: &str, texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .map(|t| Chunk::whole(doc_id, *t, false))
            .collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_assigns_composite_keys() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("x", &["one", "two", "three"]))
            .await
            .unwrap();

        let hits = store.search("three", &ids(&["d1"]), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "d1_chunk_2");
        assert_eq!(hits[0].chunk.document_id, "d1");
        assert_eq!(hits[0].document_name, "a.pdf");

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed[0].chunk_count, 3);
    }

    #[tokio::test]
    async fn test_fox_document() {
        let store = InMemoryStore::new();
        store
            .add_document(
                doc("d1", "fox.pdf"),
                chunks("d1", &["The quick brown fox jumps over the lazy dog."]),
            )
            .await
            .unwrap();

        let hits = store.search("fox jumps", &ids(&["d1"]), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);

        let hits = store.search("zebra parrot", &ids(&["d1"]), 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_list() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["irrelevant query text"]))
            .await
            .unwrap();
        assert!(store
            .search("irrelevant query", &[], 5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_contribute_nothing() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["rust memory safety"]))
            .await
            .unwrap();
        let hits = store
            .search("rust", &ids(&["missing", "d1"]), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_restricts_to_selected_documents() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["rust borrow checker"]))
            .await
            .unwrap();
        store
            .add_document(doc("d2", "b.pdf"), chunks("d2", &["rust async runtime"]))
            .await
            .unwrap();

        let hits = store.search("rust", &ids(&["d2"]), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "d2");
    }

    #[tokio::test]
    async fn test_top_k_and_ordering() {
        let store = InMemoryStore::new();
        store
            .add_document(
                doc("d1", "a.pdf"),
                chunks(
                    "d1",
                    &[
                        "cargo once",
                        "cargo cargo twice with crates",
                        "nothing relevant",
                        "crates and cargo and crates",
                        "cargo",
                    ],
                ),
            )
            .await
            .unwrap();

        let hits = store
            .search("cargo crates", &ids(&["d1"]), 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(hits.iter().all(|h| h.score > 0.0));
        assert!(hits.iter().all(|h| h.chunk.id != "d1_chunk_2"));
    }

    #[tokio::test]
    async fn test_ties_keep_candidate_order() {
        let store = InMemoryStore::new();
        store
            .add_document(
                doc("d1", "a.pdf"),
                chunks("d1", &["kernel module", "kernel driver", "kernel patch"]),
            )
            .await
            .unwrap();
        let hits = store.search("kernel", &ids(&["d1"]), 5).await.unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(order, vec!["d1_chunk_0", "d1_chunk_1", "d1_chunk_2"]);
    }

    #[tokio::test]
    async fn test_delete_removes_chunks_and_listing() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["shared topic alpha"]))
            .await
            .unwrap();
        store
            .add_document(doc("d2", "b.pdf"), chunks("d2", &["shared topic beta"]))
            .await
            .unwrap();

        let removed = store.delete_document("d1").await.unwrap();
        assert_eq!(removed.map(|d| d.name), Some("a.pdf".to_string()));

        let hits = store
            .search("shared topic", &ids(&["d1", "d2"]), 5)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.chunk.document_id != "d1"));
        assert_eq!(hits.len(), 1);

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "d2");
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let store = InMemoryStore::new();
        assert!(store.delete_document("nope").await.unwrap().is_none());
        assert_eq!(store.document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reinsert_replaces_without_orphans() {
        let store = InMemoryStore::new();
        store
            .add_document(
                doc("d1", "old.pdf"),
                chunks("d1", &["legacy alpha", "legacy beta", "legacy gamma"]),
            )
            .await
            .unwrap();
        store
            .add_document(doc("d1", "new.pdf"), chunks("d1", &["fresh alpha"]))
            .await
            .unwrap();

        let hits = store.search("legacy", &ids(&["d1"]), 5).await.unwrap();
        assert!(hits.is_empty(), "stale chunks survived re-insertion");

        let hits = store.search("alpha", &ids(&["d1"]), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_name, "new.pdf");

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chunk_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_selection_are_searched_once() {
        let store = InMemoryStore::new();
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["tokio runtime"]))
            .await
            .unwrap();
        let hits = store
            .search("tokio", &ids(&["d1", "d1"]), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    struct ConstantScorer;

    impl RelevanceScorer for ConstantScorer {
        fn keywords(&self, query: &str) -> Vec<String> {
            vec![query.to_string()]
        }
        fn score(&self, _chunk_text_lower: &str, _keywords: &[String]) -> f64 {
            0.5
        }
    }

    #[tokio::test]
    async fn test_custom_scorer() {
        let store = InMemoryStore::with_scorer(Arc::new(ConstantScorer));
        store
            .add_document(doc("d1", "a.pdf"), chunks("d1", &["anything", "else"]))
            .await
            .unwrap();
        let hits = store.search("x", &ids(&["d1"]), 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| (h.score - 0.5).abs() < 1e-9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_never_expose_stale_chunks() {
        const ROUNDS: usize = 200;
        let store = Arc::new(InMemoryStore::new());
        let temp_ids: Vec<String> = (0..ROUNDS).map(|i| format!("temp-{}", i)).collect();
        let mut selection = temp_ids.clone();
        selection.push("flip".to_string());

        let churn = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..ROUNDS {
                    let id = format!("temp-{}", i);
                    let name = format!("{}.pdf", id);
                    store
                        .add_document(doc(&id, &name), chunks(&id, &["lighthouse keeper log"]))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                    assert!(store.delete_document(&id).await.unwrap().is_some());
                }
            })
        };

        let flipper = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..ROUNDS {
                    let tag = if i % 2 == 0 { "alpha" } else { "beta" };
                    let text = format!("lighthouse keeper edition {}", tag);
                    store
                        .add_document(
                            doc("flip", &format!("flip-{}.pdf", tag)),
                            chunks("flip", &[text.as_str(), "lighthouse appendix"]),
                        )
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let selection = selection.clone();
                tokio::spawn(async move {
                    for _ in 0..ROUNDS {
                        let hits = store
                            .search("lighthouse keeper", &selection, 10)
                            .await
                            .unwrap();
                        for hit in hits {
                            let doc_id = &hit.chunk.document_id;
                            assert!(hit.chunk.id.starts_with(&format!("{}_chunk_", doc_id)));
                            if doc_id == "flip" {
                                let tag = hit
                                    .document_name
                                    .trim_start_matches("flip-")
                                    .trim_end_matches(".pdf");
                                if hit.chunk.text.contains("edition") {
                                    assert!(
                                        hit.chunk.text.ends_with(tag),
                                        "chunk {:?} served under {}",
                                        hit.chunk.text,
                                        hit.document_name
                                    );
                                }
                            } else {
                                assert_eq!(hit.document_name, format!("{}.pdf", doc_id));
                            }
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        churn.await.unwrap();
        flipper.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        let hits = store
            .search("lighthouse keeper", &temp_ids, 10)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "flip");
        assert_eq!(listed[0].name, "flip-beta.pdf");

        let flip_hits = store.search("edition", &ids(&["flip"]), 10).await.unwrap();
        assert_eq!(flip_hits.len(), 1);
        assert_eq!(flip_hits[0].chunk.text, "lighthouse keeper edition beta");
    }
}
