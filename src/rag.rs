//! Retrieval strategies: turn a query plus a document selection into a
//! grounded answer.
//!
//! | Variant | Wire name | Retrieval |
//! |---------|-----------|-----------|
//! | [`RagVariant::Basic`] | `basic` | one ranked search (`top_k`) |
//! | [`RagVariant::KnowledgeGraph`] | `knowledge_graph` | base search, then one search per expansion term |
//! | [`RagVariant::Hybrid`] | `hybrid` | both of the above, answers merged |
//!
//! When retrieval finds nothing the strategies answer with
//! [`REFUSAL_MESSAGE`] without calling the generator. Generator failures
//! are returned inside the response text as `Error: …`.
//!
//! The prompt built by [`build_context_prompt`] asks the model to answer
//! only from the supplied context. That is a prompting convention; nothing
//! verifies the model complied.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::generation::{ImageInput, TextGenerator};
use crate::models::{ChatMessage, QueryAnswer, Role, SearchHit};
use crate::relevance::extract_expansion_terms;
use crate::store::Store;

pub const REFUSAL_MESSAGE: &str =
    "I cannot answer this question as no relevant information was found in the selected documents.";

const GROUNDING_RULES: &str = "You are a helpful assistant that answers questions based ONLY on the provided document context.

IMPORTANT RULES:
1. Use ONLY information from the document context above
2. If the answer isn't in the documents, say \"I cannot answer this based on the provided documents\"
3. Do not use external knowledge
4. Cite which document you used for information";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagVariant {
    #[default]
    Basic,
    KnowledgeGraph,
    Hybrid,
}

impl RagVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagVariant::Basic => "basic",
            RagVariant::KnowledgeGraph => "knowledge_graph",
            RagVariant::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for RagVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(RagVariant::Basic),
            "knowledge_graph" => Ok(RagVariant::KnowledgeGraph),
            "hybrid" => Ok(RagVariant::Hybrid),
            other => anyhow::bail!(
                "Unknown RAG variant: '{}'. Must be basic, knowledge_graph, or hybrid.",
                other
            ),
        }
    }
}

pub struct Retriever {
    store: Arc<dyn Store>,
    generator: Arc<dyn TextGenerator>,
    params: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn TextGenerator>,
        params: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            generator,
            params,
        }
    }

    /// Answer `query` over `document_ids` with the given strategy.
    ///
    /// Errors only when the store itself fails; an empty selection or a
    /// failing generator still yields a [`QueryAnswer`].
    pub async fn process_query(
        &self,
        variant: RagVariant,
        query: &str,
        document_ids: &[String],
        history: &[ChatMessage],
        image: Option<&ImageInput>,
    ) -> Result<QueryAnswer> {
        tracing::info!(
            variant = variant.as_str(),
            documents = document_ids.len(),
            "processing query"
        );
        match variant {
            RagVariant::Basic => self.direct(query, document_ids, history, image).await,
            RagVariant::KnowledgeGraph => {
                self.expansion(query, document_ids, history, image).await
            }
            RagVariant::Hybrid => self.fusion(query, document_ids, history, image).await,
        }
    }

    async fn direct(
        &self,
        query: &str,
        document_ids: &[String],
        history: &[ChatMessage],
        image: Option<&ImageInput>,
    ) -> Result<QueryAnswer> {
        let hits = self
            .store
            .search(query, document_ids, self.params.top_k)
            .await?;
        Ok(self
            .answer_from_hits(RagVariant::Basic, query, &hits, history, image)
            .await)
    }

    async fn expansion(
        &self,
        query: &str,
        document_ids: &[String],
        history: &[ChatMessage],
        image: Option<&ImageInput>,
    ) -> Result<QueryAnswer> {
        let hits = self.expansion_hits(query, document_ids).await?;
        Ok(self
            .answer_from_hits(RagVariant::KnowledgeGraph, query, &hits, history, image)
            .await)
    }

    async fn fusion(
        &self,
        query: &str,
        document_ids: &[String],
        history: &[ChatMessage],
        image: Option<&ImageInput>,
    ) -> Result<QueryAnswer> {
        let (direct, expanded) = tokio::join!(
            self.direct(query, document_ids, history, image),
            self.expansion(query, document_ids, history, image),
        );
        let (direct, expanded) = (direct?, expanded?);

        let response = if direct.response == expanded.response {
            direct.response
        } else {
            let prompt = format!(
                "Combine these two analyses into one comprehensive answer:\n\n\
                 Basic RAG: {}\n\n\
                 Knowledge Graph RAG: {}\n\n\
                 Original question: {}\n\n\
                 Provide a unified answer:",
                direct.response, expanded.response, query
            );
            self.generate(&prompt, image).await
        };

        let sources = dedupe(direct.sources.into_iter().chain(expanded.sources));
        Ok(QueryAnswer {
            response,
            sources,
            variant: RagVariant::Hybrid,
        })
    }

    /// Chunks retrieved by the expansion strategy: the base search plus one
    /// search per expansion term, deduplicated by chunk id in first-seen
    /// order.
    pub async fn expansion_hits(
        &self,
        query: &str,
        document_ids: &[String],
    ) -> Result<Vec<SearchHit>> {
        let base = self
            .store
            .search(query, document_ids, self.params.expansion_base_k)
            .await?;
        if base.is_empty() {
            return Ok(base);
        }

        let mut seed: String = base
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        seed.push(' ');
        seed.push_str(query);
        let terms = extract_expansion_terms(&seed, self.params.expansion_terms);
        tracing::debug!(?terms, "expansion terms");

        let mut extra = Vec::new();
        for term in &terms {
            extra.extend(
                self.store
                    .search(term, document_ids, self.params.expansion_term_k)
                    .await?,
            );
        }

        let mut seen = HashSet::new();
        Ok(base
            .into_iter()
            .chain(extra)
            .filter(|h| seen.insert(h.chunk.id.clone()))
            .collect())
    }

    async fn answer_from_hits(
        &self,
        variant: RagVariant,
        query: &str,
        hits: &[SearchHit],
        history: &[ChatMessage],
        image: Option<&ImageInput>,
    ) -> QueryAnswer {
        if hits.is_empty() {
            tracing::info!(variant = variant.as_str(), "no relevant chunks, refusing");
            return QueryAnswer {
                response: REFUSAL_MESSAGE.to_string(),
                sources: Vec::new(),
                variant,
            };
        }

        let prompt = build_context_prompt(query, hits, history, self.params.history_window);
        let response = self.generate(&prompt, image).await;
        QueryAnswer {
            response,
            sources: dedupe(hits.iter().map(|h| h.document_name.clone())),
            variant,
        }
    }

    async fn generate(&self, prompt: &str, image: Option<&ImageInput>) -> String {
        match self.generator.generate(prompt, image).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    model = self.generator.model_name(),
                    error = %e,
                    "generation failed"
                );
                format!("Error: {}", e)
            }
        }
    }
}

fn dedupe(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Assemble the grounded prompt: rules, numbered context chunks, the last
/// `history_window` messages, and the question.
pub fn build_context_prompt(
    query: &str,
    hits: &[SearchHit],
    history: &[ChatMessage],
    history_window: usize,
) -> String {
    let mut context = String::from("DOCUMENT CONTEXT:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!(
            "--- From {} (Chunk {}) ---\n{}\n\n",
            hit.document_name,
            i + 1,
            hit.chunk.text
        ));
    }

    let mut history_text = String::from("CONVERSATION HISTORY:\n");
    if history.is_empty() {
        history_text.push_str("No previous conversation.\n");
    } else {
        let skip = history.len().saturating_sub(history_window);
        for msg in &history[skip..] {
            let role = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            history_text.push_str(&format!("{}: {}\n", role, msg.content));
        }
    }

    format!(
        "{}\n\n{}\n\n{}\nQuestion: {}\n\nAnswer (using only the document context):\n",
        GROUNDING_RULES, context, history_text, query
    )
}
