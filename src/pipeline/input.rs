//! Input resolution: normalise a user-supplied path or URL to a local file
//! and reject unsupported types before any processing begins.
//!
//! ## Why download to a temp file?
//!
//! pdfium requires a file-system path — it cannot stream from a byte
//! buffer. Downloading to a `TempDir` gives us a path it can open while
//! ensuring cleanup happens automatically when `ResolvedInput` is dropped,
//! even if the process panics. Magic bytes are validated before returning
//! so callers get a meaningful error rather than a decoder crash later.

use crate::error::DocParseError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The kind of document behind an input path, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

/// Classify an input path, rejecting unsupported extensions.
pub fn detect_kind(path: &Path) -> Result<InputKind, DocParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(InputKind::Pdf),
        "jpg" | "jpeg" | "png" => Ok(InputKind::Image),
        _ => Err(DocParseError::UnsupportedFileType {
            path: path.to_path_buf(),
            extension: format!(".{ext}"),
        }),
    }
}

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; file downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file path.
///
/// URLs are downloaded to a temporary directory; local paths are validated
/// for existence, readability, and recognisable magic bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocParseError> {
    if input.trim().is_empty() {
        return Err(DocParseError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Magic bytes for the supported formats: `%PDF`, PNG, JPEG.
fn magic_is_supported(magic: &[u8; 4]) -> bool {
    magic == b"%PDF" || magic[..4] == [0x89, b'P', b'N', b'G'] || magic[..2] == [0xFF, 0xD8]
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocParseError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocParseError::FileNotFound { path });
    }
    detect_kind(&path)?;

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && !magic_is_supported(&magic) {
                return Err(DocParseError::NotADocument { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocParseError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocParseError::FileNotFound { path });
        }
    }

    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocParseError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocParseError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocParseError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocParseError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocParseError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let temp_dir = TempDir::new().map_err(|e| DocParseError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);
    detect_kind(&file_path)?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocParseError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if bytes.len() >= 4 {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        if !magic_is_supported(&magic) {
            return Err(DocParseError::NotADocument {
                path: file_path,
                magic,
            });
        }
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocParseError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
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

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/scan.png"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn detect_kind_accepts_supported_extensions() {
        assert_eq!(detect_kind(Path::new("a.pdf")).unwrap(), InputKind::Pdf);
        assert_eq!(detect_kind(Path::new("a.PNG")).unwrap(), InputKind::Image);
        assert_eq!(detect_kind(Path::new("a.jpeg")).unwrap(), InputKind::Image);
    }

    #[test]
    fn detect_kind_rejects_everything_else() {
        for name in ["a.docx", "a.txt", "archive.tar.gz", "noext"] {
            let err = detect_kind(Path::new(name)).unwrap_err();
            assert!(matches!(err, DocParseError::UnsupportedFileType { .. }));
        }
    }

    #[test]
    fn magic_bytes_cover_all_supported_formats() {
        assert!(magic_is_supported(b"%PDF"));
        assert!(magic_is_supported(&[0x89, b'P', b'N', b'G']));
        assert!(magic_is_supported(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!magic_is_supported(b"PK\x03\x04"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, DocParseError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_io() {
        for input in ["", "   "] {
            let err = resolve_input(input, 1).await.unwrap_err();
            assert!(matches!(err, DocParseError::InvalidInput { .. }));
        }
    }

    #[test]
    fn extract_filename_from_url_path() {
        assert_eq!(
            extract_filename("https://example.com/papers/report.pdf"),
            "report.pdf"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.pdf");
    }
}
