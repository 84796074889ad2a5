//! Document intake: validate uploaded PDF bytes and hold them for the session.
//!
//! A [`Document`] is immutable once accepted. Its bytes sit behind an `Arc`
//! so the extraction request, the evidence locator and the viewer's PDF
//! endpoint share one buffer. We validate the PDF magic bytes (`%PDF`) up
//! front so the user gets a clear upload error instead of an opaque API or
//! pdfium failure later.

use crate::error::PathwayError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One uploaded PDF.
#[derive(Clone)]
pub struct Document {
    filename: String,
    bytes: Arc<[u8]>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Accept an uploaded file, enforcing non-empty, PDF magic and size limit.
    pub fn from_upload(
        filename: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        max_bytes: usize,
    ) -> Result<Self, PathwayError> {
        let filename = sanitize_filename(&filename.into());
        let bytes: Vec<u8> = bytes.into();

        if bytes.is_empty() {
            return Err(PathwayError::EmptyUpload { filename });
        }
        if bytes.len() > max_bytes {
            return Err(PathwayError::UploadTooLarge {
                filename,
                size: bytes.len(),
                limit: max_bytes,
            });
        }
        if !is_pdf(&bytes) {
            let magic = bytes.iter().take(4).copied().collect();
            return Err(PathwayError::NotAPdf { filename, magic });
        }

        debug!("Accepted upload '{}' ({} bytes)", filename, bytes.len());
        Ok(Self {
            filename,
            bytes: bytes.into(),
        })
    }

    /// Read a local PDF with the same checks as an upload.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: usize) -> Result<Self, PathwayError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => PathwayError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => PathwayError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        Self::from_upload(filename, bytes, max_bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check the `%PDF` magic, tolerating leading whitespace some writers emit.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"%PDF")
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() {
        "document.pdf".to_string()
    } else {
        name.to_string()
    }
}

/// Validate a whole upload set: at least one document, each accepted.
pub fn accept_uploads<I, N, B>(files: I, max_bytes: usize) -> Result<Vec<Document>, PathwayError>
where
    I: IntoIterator<Item = (N, B)>,
    N: Into<String>,
    B: Into<Vec<u8>>,
{
    let documents = files
        .into_iter()
        .map(|(name, bytes)| Document::from_upload(name, bytes, max_bytes))
        .collect::<Result<Vec<_>, _>>()?;
    if documents.is_empty() {
        return Err(PathwayError::NoDocuments);
    }
    Ok(documents)
}

/// Paths of local PDFs, resolved relative to the working directory.
pub async fn read_paths(paths: &[PathBuf], max_bytes: usize) -> Result<Vec<Document>, PathwayError> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        documents.push(Document::from_path(path, max_bytes).await?);
    }
    if documents.is_empty() {
        return Err(PathwayError::NoDocuments);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";

    #[test]
    fn accepts_pdf_magic() {
        let doc = Document::from_upload("paper.pdf", MINIMAL.to_vec(), 1024).unwrap();
        assert_eq!(doc.filename(), "paper.pdf");
        assert_eq!(doc.len(), MINIMAL.len());
    }

    #[test]
    fn rejects_non_pdf() {
        let err = Document::from_upload("notes.txt", b"hello world".to_vec(), 1024).unwrap_err();
        match err {
            PathwayError::NotAPdf { filename, magic } => {
                assert_eq!(filename, "notes.txt");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(matches!(
            Document::from_upload("a.pdf", Vec::new(), 1024),
            Err(PathwayError::EmptyUpload { .. })
        ));
        assert!(matches!(
            Document::from_upload("a.pdf", MINIMAL.to_vec(), 4),
            Err(PathwayError::UploadTooLarge { limit: 4, .. })
        ));
    }

    #[test]
    fn filename_is_reduced_to_last_component() {
        let doc = Document::from_upload("C:\\Users\\x\\paper.pdf", MINIMAL.to_vec(), 1024).unwrap();
        assert_eq!(doc.filename(), "paper.pdf");
        let doc = Document::from_upload("", MINIMAL.to_vec(), 1024).unwrap();
        assert_eq!(doc.filename(), "document.pdf");
    }

    #[test]
    fn empty_upload_set_is_an_error() {
        let files: Vec<(String, Vec<u8>)> = Vec::new();
        assert!(matches!(
            accept_uploads(files, 1024),
            Err(PathwayError::NoDocuments)
        ));
    }

    #[test]
    fn one_bad_file_rejects_the_set() {
        let files = vec![
            ("a.pdf".to_string(), MINIMAL.to_vec()),
            ("b.pdf".to_string(), b"GIF89a".to_vec()),
        ];
        assert!(matches!(
            accept_uploads(files, 1024),
            Err(PathwayError::NotAPdf { .. })
        ));
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pdf");
        std::fs::write(&path, MINIMAL).unwrap();
        let doc = Document::from_path(&path, 1024).await.unwrap();
        assert_eq!(doc.filename(), "x.pdf");

        let missing = Document::from_path(dir.path().join("nope.pdf"), 1024).await;
        assert!(matches!(missing, Err(PathwayError::FileNotFound { .. })));
    }
}
