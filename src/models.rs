//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, search hits, and chat
//! messages that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Coarse media kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Docx,
    Image,
    Unsupported,
}

impl ContentKind {
    /// Map a MIME type to a content kind.
    pub fn from_mime(content_type: &str) -> Self {
        match content_type {
            crate::extract::MIME_PDF => ContentKind::Pdf,
            crate::extract::MIME_DOCX => ContentKind::Docx,
            ct if ct.starts_with("image/") => ContentKind::Image,
            _ => ContentKind::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Docx => "docx",
            ContentKind::Image => "image",
            ContentKind::Unsupported => "unsupported",
        }
    }
}

/// A registered source document. Owned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content_preview: String,
    pub chunk_count: usize,
    /// RFC 3339 UTC timestamp of ingestion.
    pub upload_date: String,
}

/// Positional metadata for a [`Chunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    /// Sequence index within the owning document.
    pub index: usize,
    /// Length in characters.
    pub length: usize,
    /// Character offset of the first char in the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_char: Option<usize>,
    /// Character offset one past the last char in the source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_char: Option<usize>,
    /// Set when the chunk carries an ingestion error description.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

/// A contiguous slice of a document's extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// `{document_id}_chunk_{index}`.
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Deterministic chunk key.
    pub fn key(document_id: &str, index: usize) -> String {
        format!("{}_chunk_{}", document_id, index)
    }

    /// A single chunk holding content that did not come from a text split
    /// (error descriptions, image captions).
    pub fn whole(document_id: &str, text: impl Into<String>, error: bool) -> Self {
        let text = text.into();
        Self {
            id: Self::key(document_id, 0),
            document_id: document_id.to_string(),
            metadata: ChunkMetadata {
                index: 0,
                length: text.chars().count(),
                start_char: None,
                end_char: None,
                error,
            },
            text,
        }
    }
}

/// One ranked result of a store search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub document_name: String,
    /// Relevance in `(0.0, 1.0]`. Zero-score chunks are never returned.
    pub score: f64,
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

/// Final output of a retrieval strategy.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub response: String,
    pub sources: Vec<String>,
    pub variant: crate::rag::RagVariant,
}
