//! Input resolution: turn a user-supplied path, URL or byte buffer into a
//! type-checked [`SourceDocument`].
//!
//! The whole file is read into memory because both consumers want bytes:
//! pdfium loads from a byte slice and analyzers may forward the document.
//! Acceptance checks run before anything else touches the data:
//!
//! 1. a declared MIME type, when known, must be `application/pdf`
//!    (`application/octet-stream` is tolerated for servers that don't care)
//! 2. a file extension, when present, must be `.pdf`
//! 3. the `%PDF-` header must appear within the first 1024 bytes

use crate::error::DeckError;
use crate::model::SourceDocument;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Window in which the PDF header may appear (readers tolerate leading junk).
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, DeckError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DeckError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Accept an in-memory buffer as a PDF.
///
/// `mime` is the declared content type, if the caller knows one.
pub fn accept_bytes(
    name: impl Into<String>,
    bytes: impl Into<Arc<[u8]>>,
    mime: Option<&str>,
) -> Result<SourceDocument, DeckError> {
    let name = name.into();
    let bytes = bytes.into();

    let essence = mime.map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
    let declared_pdf = essence.as_deref() == Some("application/pdf");
    if let Some(essence) = essence.as_deref() {
        if !declared_pdf && essence != "application/octet-stream" {
            return Err(DeckError::NotAPdf {
                name,
                reason: format!("content type is '{essence}'"),
            });
        }
    }

    // A declared application/pdf wins over the name: URLs like /pdf/1706.03762
    // carry no real extension.
    if !declared_pdf {
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        if let Some(ext) = ext.filter(|e| !e.eq_ignore_ascii_case("pdf")) {
            return Err(DeckError::NotAPdf {
                name,
                reason: format!("extension is '.{ext}'"),
            });
        }
    }

    if !has_pdf_header(&bytes) {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(DeckError::NotAPdf {
            name,
            reason: format!("missing %PDF header, first bytes: {magic:?}"),
        });
    }

    debug!("Accepted PDF '{}' ({} bytes)", name, bytes.len());
    Ok(SourceDocument { name, bytes })
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path: &Path) -> Result<SourceDocument, DeckError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DeckError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DeckError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local PDF: {}", path.display());
    accept_bytes(name, bytes, None)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, DeckError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DeckError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DeckError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DeckError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DeckError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DeckError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    accept_bytes(filename, bytes.to_vec(), mime.as_deref())
}

/// Extract a reasonable file name from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn accepts_pdf_bytes() {
        let doc = accept_bytes("slides.PDF", MINI_PDF.to_vec(), Some("application/pdf")).unwrap();
        assert_eq!(doc.name, "slides.PDF");
        assert_eq!(doc.bytes.len(), MINI_PDF.len());
    }

    #[test]
    fn accepts_header_after_leading_junk() {
        let mut bytes = b"\xEF\xBB\xBF\n".to_vec();
        bytes.extend_from_slice(MINI_PDF);
        assert!(accept_bytes("doc", bytes, None).is_ok());
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = accept_bytes("notes.docx", MINI_PDF.to_vec(), None).unwrap_err();
        assert!(matches!(err, DeckError::NotAPdf { .. }));
        assert!(err.to_string().contains(".docx"));
    }

    #[test]
    fn rejects_wrong_mime() {
        let err = accept_bytes("doc.pdf", MINI_PDF.to_vec(), Some("text/html; charset=utf-8"))
            .unwrap_err();
        assert!(err.to_string().contains("text/html"));
    }

    #[test]
    fn tolerates_octet_stream() {
        assert!(accept_bytes("doc.pdf", MINI_PDF.to_vec(), Some("application/octet-stream")).is_ok());
    }

    #[test]
    fn declared_pdf_overrides_dotted_url_name() {
        let name = extract_filename("https://arxiv.org/pdf/1706.03762");
        assert_eq!(name, "1706.03762");
        let doc = accept_bytes(name, MINI_PDF.to_vec(), Some("application/pdf")).unwrap();
        assert_eq!(doc.name, "1706.03762");
    }

    #[test]
    fn octet_stream_still_checks_extension() {
        let err = accept_bytes("1706.03762", MINI_PDF.to_vec(), Some("application/octet-stream"))
            .unwrap_err();
        assert!(err.to_string().contains("extension is '.03762'"), "{err}");
    }

    #[test]
    fn rejects_missing_header() {
        let err = accept_bytes("doc.pdf", b"PK\x03\x04rest".to_vec(), None).unwrap_err();
        assert!(err.to_string().contains("missing %PDF header"));
    }

    #[test]
    fn extract_filename_from_url() {
        assert_eq!(extract_filename("https://x.org/papers/a.pdf"), "a.pdf");
        assert_eq!(extract_filename("https://x.org/papers/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, DeckError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pdf");
        std::fs::write(&path, MINI_PDF).unwrap();
        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.name, "deck.pdf");
    }
}
