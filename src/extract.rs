//! Plain-text extraction for uploaded binary documents (PDF, DOCX).
//!
//! Extraction returns UTF-8 text or an [`ExtractError`]. The PDF parser can
//! panic on malformed input, so async callers go through
//! [`extract_text_blocking`], which runs the parse on the blocking pool and
//! reports a panic as an error. Turning an error into a registrable
//! document is the job of [`crate::ingest`].
//!
//! PDF text is assembled per page: each page with text gets a
//! `Page {n}:` header, and blank pages are skipped.

use std::io::Read;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extract plain text from `bytes` according to `content_type`.
///
/// Runs on the calling thread and may panic inside the PDF parser; prefer
/// [`extract_text_blocking`] from async code.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Run [`extract_text`] on tokio's blocking pool.
///
/// A panic in the parser surfaces as [`ExtractError::Pdf`] or
/// [`ExtractError::Docx`] instead of unwinding into the caller.
pub async fn extract_text_blocking(
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, ExtractError> {
    let ct = content_type.to_string();
    match tokio::task::spawn_blocking(move || extract_text(&bytes, &ct)).await {
        Ok(result) => result,
        Err(e) => {
            let reason = if e.is_panic() {
                let payload = e.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("parser panicked: {}", message)
            } else {
                format!("extraction task failed: {}", e)
            };
            Err(match content_type {
                MIME_DOCX => ExtractError::Docx(reason),
                _ => ExtractError::Pdf(reason),
            })
        }
    }
}

/// Guess a MIME type from a file name's extension.
pub fn mime_from_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(join_pages(&pages))
}

/// `Page {n}:` header plus text for every page that has any, 1-based and
/// counting skipped pages.
fn join_pages(pages: &[String]) -> String {
    let mut out = String::new();
    for (i, text) in pages.iter().enumerate() {
        if text.trim().is_empty() {
            continue;
        }
        out.push_str(&format!("Page {}:\n{}\n\n", i + 1, text));
    }
    out
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    docx_paragraphs(&doc_xml)
}

/// Collect `w:t` runs, one blank-line-separated block per non-empty `w:p`.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        out.push_str(&paragraph);
                        out.push_str("\n\n");
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !paragraph.trim().is_empty() {
        out.push_str(&paragraph);
    }
    Ok(out)
}
