//! Entry points: parse a single image, a stack of page images, or a file
//! path / URL with automatic PDF-vs-image dispatch.
//!
//! ## Aggregation policy
//!
//! Pages of a multi-page document are processed strictly in source page
//! order, each through the same per-page pipeline. A failed page is
//! recorded as a [`PageResult`] carrying its [`PageError`]; pages already
//! completed are always retained, and the run only becomes a fatal
//! [`DocParseError::AllPagesFailed`] when *no* page produced elements.
//!
//! ## Two independent consumers of the element list
//!
//! The structural trees attached as `parsed_content` and the flat markdown
//! rendering are computed from independent copies of the per-page element
//! lists, so neither can corrupt the other's input: markdown always sees
//! the raw recognized text, JSON always carries the normalized tree.

use crate::backend::RecognitionBackend;
use crate::config::ParseConfig;
use crate::error::{DocParseError, PageError};
use crate::markdown::MarkdownRenderer;
use crate::output::{
    DocumentResult, PageResult, ParseOutput, ParseStats, ParsedDocument, RecognizedElement,
};
use crate::persist;
use crate::pipeline::{elements, input, prepare, render};
use crate::structure;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Parse a document from a local path or HTTP(S) URL.
///
/// `.pdf` inputs are rasterised and processed page by page; `.jpg`/`.jpeg`/
/// `.png` inputs are processed as a single page. Anything else is rejected
/// as [`DocParseError::UnsupportedFileType`] before any processing begins.
pub async fn parse(
    input_str: impl AsRef<str>,
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
) -> Result<ParseOutput, DocParseError> {
    let input_str = input_str.as_ref();
    info!("Starting parse: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();
    let kind = input::detect_kind(&path)?;
    let base_name = file_stem(&path);

    match kind {
        input::InputKind::Image => {
            let page = image::open(&path)
                .map_err(|e| DocParseError::ImageDecodeFailed {
                    path: path.clone(),
                    detail: e.to_string(),
                })?
                .to_rgb8();
            parse_image(page, &base_name, backend, config).await
        }
        input::InputKind::Pdf => {
            let pages = render::render_pages(&path, config.max_rendered_pixels).await?;
            parse_pages(pages, &base_name, &path.to_string_lossy(), backend, config).await
        }
    }
}

/// Parse a single page image already in memory.
///
/// The result is a bare element list (no `pages` structure), persisted as
/// `recognition_json/{image_name}.json` when a save dir is configured.
pub async fn parse_image(
    page: RgbImage,
    image_name: &str,
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
) -> Result<ParseOutput, DocParseError> {
    let total_start = Instant::now();
    let save_dir = prepare_save_dir(config)?;
    let mut stats = ParseStats {
        total_pages: 1,
        ..Default::default()
    };

    // A single image has nothing to salvage: a layout failure is fatal as
    // such, anything later degrades to the all-pages form.
    let elements = match process_page(&page, backend, config, save_dir, image_name, 1, &mut stats)
        .await
    {
        Ok(elements) => elements,
        Err(PageError::LayoutFailed { detail, .. }) => {
            return Err(DocParseError::LayoutFailed { detail });
        }
        Err(e) => {
            return Err(DocParseError::AllPagesFailed {
                total: 1,
                first_error: e.to_string(),
            });
        }
    };

    stats.processed_pages = 1;
    stats.total_elements = elements.len();

    let augmented = attach_parsed_content(&elements);
    let markdown = render_markdown(config.markdown_renderer.as_deref(), &elements);

    let mut json_path = None;
    let mut markdown_path = None;
    if let Some(dir) = save_dir {
        json_path = Some(persist::save_json(&augmented, dir, image_name).await?);
        if let Some(md) = &markdown {
            markdown_path = Some(persist::save_markdown(md, dir, image_name).await?);
        }
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Parsed image '{}': {} elements in {}ms",
        image_name, stats.total_elements, stats.total_duration_ms
    );

    Ok(ParseOutput {
        document: ParsedDocument::Image(augmented),
        json_path,
        markdown_path,
        stats,
    })
}

/// Parse an ordered stack of page images as one multi-page document.
///
/// Page order in `pages` is the document page order; page N+1 does not
/// start until page N's elements are fully produced. Earlier pages are
/// retained when a later page fails.
pub async fn parse_pages(
    pages: Vec<RgbImage>,
    doc_name: &str,
    source_file: &str,
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
) -> Result<ParseOutput, DocParseError> {
    let total_start = Instant::now();
    let save_dir = prepare_save_dir(config)?;
    let total_pages = pages.len();
    let mut stats = ParseStats {
        total_pages,
        ..Default::default()
    };

    if let Some(cb) = &config.progress_callback {
        cb.on_document_start(total_pages);
    }

    let mut raw_pages: Vec<PageResult> = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;
        // Figure names key off this; fixed before any dispatch begins.
        let page_name = format!("{doc_name}_page_{page_number:03}");
        info!("Processing page {page_number}/{total_pages}");

        if let Some(cb) = &config.progress_callback {
            cb.on_page_start(page_number, total_pages);
        }

        match process_page(
            page,
            backend,
            config,
            save_dir,
            &page_name,
            page_number,
            &mut stats,
        )
        .await
        {
            Ok(elements) => {
                if let Some(cb) = &config.progress_callback {
                    cb.on_page_complete(page_number, total_pages, elements.len());
                }
                raw_pages.push(PageResult {
                    page_number,
                    elements,
                    error: None,
                });
            }
            Err(e) => {
                warn!("Page {page_number} failed: {e}");
                if let Some(cb) = &config.progress_callback {
                    cb.on_page_error(page_number, total_pages, &e.to_string());
                }
                raw_pages.push(PageResult {
                    page_number,
                    elements: Vec::new(),
                    error: Some(e),
                });
            }
        }
    }

    stats.processed_pages = raw_pages.iter().filter(|p| p.error.is_none()).count();
    stats.failed_pages = raw_pages.iter().filter(|p| p.error.is_some()).count();
    stats.total_elements = raw_pages.iter().map(|p| p.elements.len()).sum();

    if let Some(cb) = &config.progress_callback {
        cb.on_document_complete(total_pages, stats.processed_pages);
    }

    if stats.processed_pages == 0 && total_pages > 0 {
        let first_error = raw_pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(DocParseError::AllPagesFailed {
            total: total_pages,
            first_error,
        });
    }

    // Structural trees for JSON; markdown renders from the raw copies.
    let augmented_pages: Vec<PageResult> = raw_pages
        .iter()
        .map(|p| PageResult {
            page_number: p.page_number,
            elements: attach_parsed_content(&p.elements),
            error: p.error.clone(),
        })
        .collect();

    let document = DocumentResult {
        source_file: source_file.to_string(),
        total_pages,
        pages: augmented_pages,
    };

    let flat = flatten_for_markdown(&raw_pages, config);
    let markdown = render_markdown(config.markdown_renderer.as_deref(), &flat);

    let mut json_path = None;
    let mut markdown_path = None;
    if let Some(dir) = save_dir {
        json_path = Some(persist::save_json(&document, dir, doc_name).await?);
        if let Some(md) = &markdown {
            markdown_path = Some(persist::save_markdown(md, dir, doc_name).await?);
        }
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Parsed document '{}': {}/{} pages, {} elements, {}ms",
        doc_name, stats.processed_pages, total_pages, stats.total_elements, stats.total_duration_ms
    );

    Ok(ParseOutput {
        document: ParsedDocument::Pdf(document),
        json_path,
        markdown_path,
        stats,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the per-page pipeline: prepare → layout → element processing.
async fn process_page(
    page: &RgbImage,
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
    save_dir: Option<&Path>,
    image_name: &str,
    page_number: usize,
    stats: &mut ParseStats,
) -> Result<Vec<RecognizedElement>, PageError> {
    let padded = prepare::prepare_inference_image(page, config.inference_edge);

    let layout_start = Instant::now();
    let layout = backend
        .layout(&padded.image)
        .await
        .map_err(|e| PageError::LayoutFailed {
            page: page_number,
            detail: e.to_string(),
        })?;
    stats.layout_duration_ms += layout_start.elapsed().as_millis() as u64;
    debug!("Page {page_number}: layout string is {} chars", layout.len());

    let recognition_start = Instant::now();
    let elements = elements::process_elements(
        &layout,
        &padded,
        backend,
        config,
        save_dir,
        image_name,
        page_number,
    )
    .await?;
    stats.recognition_duration_ms += recognition_start.elapsed().as_millis() as u64;

    Ok(elements)
}

/// Ensure the output directory structure exists, when persistence is on.
fn prepare_save_dir(config: &ParseConfig) -> Result<Option<&Path>, DocParseError> {
    match &config.save_dir {
        Some(dir) => {
            persist::setup_output_dirs(dir)?;
            Ok(Some(dir.as_path()))
        }
        None => Ok(None),
    }
}

/// Clone the elements, attaching a structural tree to each non-empty text.
fn attach_parsed_content(elements: &[RecognizedElement]) -> Vec<RecognizedElement> {
    elements
        .iter()
        .map(|e| {
            let mut out = e.clone();
            if !out.text.is_empty() {
                out.parsed_content = Some(structure::normalize(&out.text));
            }
            out
        })
        .collect()
}

/// Flatten successful pages into one list with separator pseudo-elements.
fn flatten_for_markdown(pages: &[PageResult], config: &ParseConfig) -> Vec<RecognizedElement> {
    let mut all: Vec<RecognizedElement> = Vec::new();
    for page in pages {
        if page.elements.is_empty() {
            continue;
        }
        if !all.is_empty() {
            if let Some(text) = config.page_separator.text() {
                all.push(RecognizedElement::page_separator(text, all.len()));
            }
        }
        all.extend(page.elements.iter().cloned());
    }
    all
}

/// Render markdown, tolerating absence and failure.
fn render_markdown(
    renderer: Option<&dyn MarkdownRenderer>,
    elements: &[RecognizedElement],
) -> Option<String> {
    let renderer = renderer?;
    match renderer.render(elements) {
        Ok(md) => Some(md),
        Err(e) => {
            warn!("Markdown rendering failed, continuing without it: {e}");
            None
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RegionLabel;

    fn elem(text: &str, order: usize) -> RecognizedElement {
        RecognizedElement {
            label: RegionLabel::Paragraph,
            bbox: Some([0, 0, 10, 10]),
            text: text.into(),
            figure_path: None,
            reading_order: order,
            parsed_content: None,
        }
    }

    #[test]
    fn attach_parsed_content_leaves_originals_untouched() {
        let original = vec![elem("<h1>Hi</h1>", 0)];
        let augmented = attach_parsed_content(&original);
        assert!(original[0].parsed_content.is_none());
        assert!(augmented[0].parsed_content.is_some());
        assert_eq!(original[0].text, augmented[0].text);
    }

    #[test]
    fn flatten_inserts_separators_between_nonempty_pages() {
        let pages = vec![
            PageResult {
                page_number: 1,
                elements: vec![elem("one", 0)],
                error: None,
            },
            PageResult {
                page_number: 2,
                elements: vec![],
                error: Some(PageError::LayoutFailed {
                    page: 2,
                    detail: "x".into(),
                }),
            },
            PageResult {
                page_number: 3,
                elements: vec![elem("three", 0)],
                error: None,
            },
        ];
        let flat = flatten_for_markdown(&pages, &ParseConfig::default());
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[1].label, RegionLabel::PageSeparator);
        assert_eq!(flat[2].text, "three");
    }

    #[test]
    fn file_stem_falls_back_for_odd_paths() {
        assert_eq!(file_stem(Path::new("dir/report.pdf")), "report");
        assert_eq!(file_stem(Path::new("/")), "document");
    }
}
