//! Persisted output layout.
//!
//! Everything lands under the configured save dir:
//!
//! ```text
//! <save_dir>/
//!   recognition_json/<name>.json   structured results (with parsed_content)
//!   markdown/<name>.md             flat rendering from the original elements
//!   figures/<name>_<order>.png     figure crops, write-once per (name, order)
//! ```
//!
//! JSON and markdown writes are atomic (temp file + rename) so a crash
//! never leaves a truncated result behind. Persistence failures surface to
//! the caller but never corrupt the in-memory results that were already
//! computed.

use crate::error::DocParseError;
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Create the output directory structure.
pub fn setup_output_dirs(save_dir: &Path) -> Result<(), DocParseError> {
    for sub in ["recognition_json", "markdown", "figures"] {
        let dir = save_dir.join(sub);
        std::fs::create_dir_all(&dir).map_err(|e| DocParseError::OutputWriteFailed {
            path: dir,
            source: e,
        })?;
    }
    Ok(())
}

/// Persist a figure crop as `figures/{image_name}_{reading_order}.png`.
///
/// The name is derived from immutable identifiers fixed before any dispatch
/// begins, so the write is naturally collision-free; an existing file is
/// left untouched (write-once).
pub fn save_figure(
    crop: &RgbImage,
    save_dir: &Path,
    image_name: &str,
    reading_order: usize,
) -> Result<String, image::ImageError> {
    let filename = format!("{image_name}_{reading_order}.png");
    let path = save_dir.join("figures").join(&filename);
    if !path.exists() {
        crop.save(&path)?;
        debug!("Saved figure crop: {}", path.display());
    }
    Ok(filename)
}

/// Persist a JSON value as `recognition_json/{name}.json`, atomically.
pub async fn save_json<T: Serialize>(
    value: &T,
    save_dir: &Path,
    name: &str,
) -> Result<PathBuf, DocParseError> {
    let path = save_dir.join("recognition_json").join(format!("{name}.json"));
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| DocParseError::Internal(format!("JSON serialisation failed: {e}")))?;
    atomic_write(&path, &body).await?;
    debug!("Saved JSON results: {}", path.display());
    Ok(path)
}

/// Persist markdown as `markdown/{name}.md`, atomically.
pub async fn save_markdown(
    content: &str,
    save_dir: &Path,
    name: &str,
) -> Result<PathBuf, DocParseError> {
    let path = save_dir.join("markdown").join(format!("{name}.md"));
    atomic_write(&path, content.as_bytes()).await?;
    debug!("Saved markdown: {}", path.display());
    Ok(path)
}

/// Write to a temp sibling, then rename over the target.
async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), DocParseError> {
    let map_err = |e: std::io::Error| DocParseError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(map_err)?;
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(map_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(map_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[tokio::test]
    async fn json_write_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        setup_output_dirs(dir.path()).unwrap();

        let value = serde_json::json!({"pages": []});
        let path = save_json(&value, dir.path(), "doc").await.unwrap();
        assert!(path.ends_with("recognition_json/doc.json"));

        let body = std::fs::read_to_string(&path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(back, value);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn markdown_lands_in_markdown_dir() {
        let dir = tempfile::tempdir().unwrap();
        setup_output_dirs(dir.path()).unwrap();

        let path = save_markdown("# Title\n", dir.path(), "doc").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Title\n");
    }

    #[test]
    fn figure_write_is_once_per_key() {
        let dir = tempfile::tempdir().unwrap();
        setup_output_dirs(dir.path()).unwrap();

        let crop = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let first = save_figure(&crop, dir.path(), "page_001", 2).unwrap();
        assert_eq!(first, "page_001_2.png");

        let modified = std::fs::metadata(dir.path().join("figures").join(&first))
            .unwrap()
            .modified()
            .unwrap();

        // Second save with the same key leaves the file untouched.
        let again = save_figure(&crop, dir.path(), "page_001", 2).unwrap();
        assert_eq!(again, first);
        let modified_again = std::fs::metadata(dir.path().join("figures").join(&first))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(modified, modified_again);
    }
}
