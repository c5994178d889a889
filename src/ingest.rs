//! Ingestion pipeline: uploaded file → [`Document`] + [`Chunk`]s → store.
//!
//! Ingestion never fails because of file content. Unsupported types,
//! corrupt files, files without text, and failed image captioning all
//! produce a document with a single explanatory chunk, so downstream
//! search treats them as ordinary (usually zero-scoring) content.
//!
//! ```text
//! bytes + content-type
//!   ├─ pdf / docx ─▶ extract (blocking pool) ─▶ trim ─▶ chunk_text
//!   ├─ image/*    ─▶ generator caption ─▶ "IMAGE_DESCRIPTION: …"
//!   └─ other      ─▶ "Unsupported file type"
//! ```

use anyhow::Result;
use std::sync::Arc;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::extract::{extract_text_blocking, MIME_DOCX, MIME_PDF};
use crate::generation::{ImageInput, TextGenerator};
use crate::models::{Chunk, ContentKind, Document};
use crate::store::Store;

/// Characters of extracted text shown as a document preview.
const PREVIEW_CHARS: usize = 200;

const IMAGE_PROMPT: &str =
    "Extract all text and describe this image in detail for document context:";

/// Result of processing one file, before it is registered in a store.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub name: String,
    pub kind: ContentKind,
    pub content_preview: String,
    pub chunks: Vec<Chunk>,
}

pub struct DocumentProcessor {
    chunking: ChunkingConfig,
    generator: Arc<dyn TextGenerator>,
}

impl DocumentProcessor {
    pub fn new(chunking: ChunkingConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            chunking,
            generator,
        }
    }

    /// Extract and chunk one file.
    ///
    /// Only an invalid chunking configuration is an error; everything that
    /// can go wrong with the file itself is folded into the result.
    pub async fn process(
        &self,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<ProcessedFile> {
        let kind = ContentKind::from_mime(content_type);
        tracing::info!(
            filename,
            content_type,
            size = bytes.len(),
            kind = kind.as_str(),
            "processing file"
        );

        let processed = match kind {
            ContentKind::Pdf | ContentKind::Docx => {
                self.process_text_document(document_id, bytes, filename, content_type, kind)
                    .await?
            }
            ContentKind::Image => self.process_image(document_id, bytes, filename, content_type).await,
            ContentKind::Unsupported => ProcessedFile {
                name: filename.to_string(),
                kind,
                content_preview: "Unsupported file type".to_string(),
                chunks: vec![Chunk::whole(document_id, "Unsupported file type", false)],
            },
        };

        Ok(processed)
    }

    async fn process_text_document(
        &self,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
        kind: ContentKind,
    ) -> Result<ProcessedFile> {
        let label = match content_type {
            MIME_PDF => "PDF",
            MIME_DOCX => "DOCX",
            _ => "document",
        };

        let text = match extract_text_blocking(bytes.to_vec(), content_type).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(filename, error = %e, "text extraction failed");
                return Ok(ProcessedFile {
                    name: filename.to_string(),
                    kind,
                    content_preview: format!("{} processing error: {}", label, e),
                    chunks: vec![Chunk::whole(
                        document_id,
                        format!("Error processing {}: {}", label, e),
                        true,
                    )],
                });
            }
        };

        let text = text.trim();
        let chunks = chunk_text(document_id, text, &self.chunking)?;
        if chunks.is_empty() {
            let preview = match kind {
                ContentKind::Pdf => "PDF with no extractable text",
                _ => "DOCX with no text content",
            };
            return Ok(ProcessedFile {
                name: filename.to_string(),
                kind,
                content_preview: preview.to_string(),
                chunks: vec![Chunk::whole(
                    document_id,
                    format!("No text content found in {}", label),
                    false,
                )],
            });
        }

        Ok(ProcessedFile {
            name: filename.to_string(),
            kind,
            content_preview: preview(text),
            chunks,
        })
    }

    async fn process_image(
        &self,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> ProcessedFile {
        let image = ImageInput::new(bytes.to_vec(), content_type);
        match self.generator.generate(IMAGE_PROMPT, Some(&image)).await {
            Ok(description) => ProcessedFile {
                name: filename.to_string(),
                kind: ContentKind::Image,
                content_preview: format!("Image analysis: {}", preview(&description)),
                chunks: vec![Chunk::whole(
                    document_id,
                    format!("IMAGE_DESCRIPTION: {}", description),
                    false,
                )],
            },
            Err(e) => {
                tracing::warn!(filename, error = %e, "image captioning failed");
                ProcessedFile {
                    name: filename.to_string(),
                    kind: ContentKind::Image,
                    content_preview: format!("Image processing error: {}", e),
                    chunks: vec![Chunk::whole(
                        document_id,
                        format!("Error processing image: {}", e),
                        true,
                    )],
                }
            }
        }
    }

    /// Process a file under a fresh document id and register it in `store`.
    pub async fn ingest(
        &self,
        store: &dyn Store,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<Document> {
        let document_id = uuid::Uuid::new_v4().to_string();
        let processed = self
            .process(&document_id, bytes, filename, content_type)
            .await?;

        let document = Document {
            id: document_id,
            name: processed.name,
            kind: processed.kind,
            content_preview: processed.content_preview,
            chunk_count: processed.chunks.len(),
            upload_date: chrono::Utc::now().to_rfc3339(),
        };

        store
            .add_document(document.clone(), processed.chunks)
            .await?;
        tracing::info!(
            document_id = %document.id,
            name = %document.name,
            chunks = document.chunk_count,
            "document added"
        );
        Ok(document)
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended when truncated.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{DisabledGenerator, GenerationError};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct Captioner;

    #[async_trait]
    impl TextGenerator for Captioner {
        fn model_name(&self) -> &str {
            "captioner"
        }
        async fn generate(
            &self,
            prompt: &str,
            image: Option<&ImageInput>,
        ) -> Result<String, GenerationError> {
            assert_eq!(prompt, IMAGE_PROMPT);
            let image = image.expect("image attached");
            Ok(format!("a {} picture of a lighthouse", image.mime_type))
        }
    }

    fn processor(generator: Arc<dyn TextGenerator>) -> DocumentProcessor {
        DocumentProcessor::new(ChunkingConfig::default(), generator)
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(250);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 203);
        assert_eq!(preview(&"x".repeat(200)), "x".repeat(200));
    }

    #[tokio::test]
    async fn test_unsupported_type() {
        let p = processor(Arc::new(DisabledGenerator));
        let out = p.process("d1", b"hello", "notes.txt", "text/plain").await.unwrap();
        assert_eq!(out.kind, ContentKind::Unsupported);
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.chunks[0].text, "Unsupported file type");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_becomes_error_chunk() {
        let p = processor(Arc::new(DisabledGenerator));
        let out = p.process("d1", b"garbage", "bad.pdf", MIME_PDF).await.unwrap();
        assert_eq!(out.kind, ContentKind::Pdf);
        assert_eq!(out.chunks.len(), 1);
        assert!(out.chunks[0].metadata.error);
        assert!(out.chunks[0].text.starts_with("Error processing PDF:"));
        assert!(out.content_preview.starts_with("PDF processing error:"));
    }

    #[tokio::test]
    async fn test_pdf_parser_panic_becomes_error_chunk() {
        let p = processor(Arc::new(DisabledGenerator));
        let bytes = crate::extract::fixtures::pdf_with_missing_font();
        let out = p.process("d1", &bytes, "broken.pdf", MIME_PDF).await.unwrap();
        assert_eq!(out.chunks.len(), 1);
        assert!(out.chunks[0].metadata.error);
        assert!(out.chunks[0].text.starts_with("Error processing PDF:"));

        let store = InMemoryStore::new();
        let doc = p.ingest(&store, &bytes, "broken.pdf", MIME_PDF).await.unwrap();
        assert_eq!(doc.chunk_count, 1);
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_image_is_captioned() {
        let p = processor(Arc::new(Captioner));
        let out = p.process("d1", b"\x89PNG", "pic.png", "image/png").await.unwrap();
        assert_eq!(out.kind, ContentKind::Image);
        assert_eq!(
            out.chunks[0].text,
            "IMAGE_DESCRIPTION: a image/png picture of a lighthouse"
        );
        assert!(out.content_preview.starts_with("Image analysis: "));
    }

    #[tokio::test]
    async fn test_image_caption_failure_is_recovered() {
        let p = processor(Arc::new(DisabledGenerator));
        let out = p.process("d1", b"\x89PNG", "pic.png", "image/png").await.unwrap();
        assert!(out.chunks[0].metadata.error);
        assert!(out.chunks[0].text.starts_with("Error processing image:"));
    }

    #[tokio::test]
    async fn test_ingest_registers_document() {
        let store = InMemoryStore::new();
        let p = processor(Arc::new(DisabledGenerator));
        let doc = p
            .ingest(&store, b"garbage", "bad.pdf", MIME_PDF)
            .await
            .unwrap();
        assert_eq!(doc.chunk_count, 1);
        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, doc.id);
        assert_eq!(listed[0].name, "bad.pdf");
    }
}
