//! Document text extraction.
//!
//! Converts an uploaded document into plain text. Supported families:
//!
//! - **Word processor** (`.docx`): paragraph text from `word/document.xml`
//! - **PDF**: the embedded text layer
//! - **Spreadsheet** (`.xlsx`, `.xls`): every sheet, cells tab-joined
//! - **Plain text**: UTF-8 with legacy-encoding fallback
//! - **HWP**: best-effort scan, never fails
//!
//! File reads are async; parsing runs on the blocking pool so a large PDF
//! can't stall the runtime.

mod docx;
mod hwp;
mod pdf;
mod spreadsheet;
mod text;

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Media types accepted at upload time
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "text/plain",
    "application/x-hwp",
    "application/haansofthwp",
    "application/vnd.hancom.hwp",
    "application/octet-stream",
];

/// File extensions accepted at upload time
pub const ACCEPTED_EXTENSIONS: &[&str] = &["docx", "pdf", "xlsx", "xls", "txt", "hwp"];

/// Document family, which decides the extraction method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFamily {
    WordProcessor,
    Pdf,
    Spreadsheet,
    PlainText,
    Hwp,
}

impl MediaFamily {
    /// Classify a declared media type. Generic types return `None`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let mt = essence(media_type);
        if mt.contains("wordprocessingml") {
            Some(Self::WordProcessor)
        } else if mt == "application/pdf" {
            Some(Self::Pdf)
        } else if mt.contains("spreadsheetml") || mt == "application/vnd.ms-excel" {
            Some(Self::Spreadsheet)
        } else if mt.starts_with("text/") {
            Some(Self::PlainText)
        } else if mt.contains("hwp") {
            Some(Self::Hwp)
        } else {
            None
        }
    }

    /// Classify by filename extension
    pub fn from_extension(filename: &str) -> Option<Self> {
        match extension(filename)?.as_str() {
            "docx" => Some(Self::WordProcessor),
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "txt" => Some(Self::PlainText),
            "hwp" => Some(Self::Hwp),
            _ => None,
        }
    }

    /// Media type first, extension as the fallback for generic types
    pub fn detect(media_type: &str, filename: &str) -> Option<Self> {
        Self::from_media_type(media_type).or_else(|| Self::from_extension(filename))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordProcessor => "docx",
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::PlainText => "text",
            Self::Hwp => "hwp",
        }
    }
}

/// Media type without parameters, lowercased
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Lowercased extension of a filename, if any
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_accepted_media_type(media_type: &str) -> bool {
    let mt = essence(media_type);
    ACCEPTED_MEDIA_TYPES.contains(&mt.as_str()) || mt.starts_with("text/")
}

pub fn is_accepted_extension(filename: &str) -> bool {
    extension(filename).is_some_and(|e| ACCEPTED_EXTENSIONS.contains(&e.as_str()))
}

/// Extract text from the file at `path`, naming it by its own filename.
pub async fn extract(path: &Path, media_type: &str) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    extract_as(path, media_type, &name).await
}

/// Extract text from the file at `path`. `display_name` is the user-facing
/// filename, used for extension fallback and in error messages.
pub async fn extract_as(path: &Path, media_type: &str, display_name: &str) -> Result<String> {
    let family = MediaFamily::detect(media_type, display_name)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{} ({})", display_name, media_type)))?;

    let bytes = tokio::fs::read(path).await?;
    let size = bytes.len();
    let name = display_name.to_string();

    let text = tokio::task::spawn_blocking(move || parse(family, &bytes, &name))
        .await
        .map_err(|e| Error::corrupt(display_name, format!("parser crashed: {}", e)))??;

    debug!(
        file = %display_name,
        family = family.as_str(),
        bytes = size,
        chars = text.chars().count(),
        "Extracted document text"
    );

    if text.trim().is_empty() {
        return Err(Error::EmptyDocument(display_name.to_string()));
    }
    Ok(text)
}

/// Synchronous dispatch to the family parser
pub fn parse(family: MediaFamily, bytes: &[u8], filename: &str) -> Result<String> {
    match family {
        MediaFamily::WordProcessor => docx::extract(bytes, filename),
        MediaFamily::Pdf => pdf::extract(bytes, filename),
        MediaFamily::Spreadsheet => spreadsheet::extract(bytes, filename),
        MediaFamily::PlainText => Ok(text::decode(bytes)),
        MediaFamily::Hwp => Ok(hwp::extract(bytes, filename)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_detect_by_media_type() {
        assert_eq!(
            MediaFamily::detect(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "a.bin"
            ),
            Some(MediaFamily::WordProcessor)
        );
        assert_eq!(
            MediaFamily::detect("text/plain; charset=utf-8", "notes"),
            Some(MediaFamily::PlainText)
        );
        assert_eq!(
            MediaFamily::detect("application/vnd.ms-excel", "x"),
            Some(MediaFamily::Spreadsheet)
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            MediaFamily::detect("application/octet-stream", "report.HWP"),
            Some(MediaFamily::Hwp)
        );
        assert_eq!(MediaFamily::detect("", "book.xlsx"), Some(MediaFamily::Spreadsheet));
        assert_eq!(MediaFamily::detect("application/zip", "archive.zip"), None);
    }

    #[test]
    fn test_accept_lists() {
        assert!(is_accepted_media_type("application/pdf"));
        assert!(is_accepted_media_type("text/csv"));
        assert!(!is_accepted_media_type("image/png"));
        assert!(is_accepted_extension("업무.hwp"));
        assert!(!is_accepted_extension("script.sh"));
        assert!(!is_accepted_extension("noext"));
    }

    #[tokio::test]
    async fn test_extract_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "1. Weekly report\n- takes 30 minutes").unwrap();

        let text = extract(&path, "text/plain").await.unwrap();
        assert!(text.contains("Weekly report"));
    }

    #[tokio::test]
    async fn test_extract_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\n ").unwrap();

        let err = extract(&path, "text/plain").await.unwrap_err();
        assert!(matches!(err, Error::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn test_extract_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let err = extract(&path, "image/png").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_extract_corrupt_docx() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not a zip archive").unwrap();

        let err = extract(&path, "application/octet-stream").await.unwrap_err();
        assert!(matches!(err, Error::CorruptDocument { .. }));
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let err = extract(Path::new("/nonexistent/taskscope/x.txt"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
