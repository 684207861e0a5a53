//! End-to-end pipeline tests against a scripted in-memory backend.
//!
//! The backend double recognises crops by their top-left pixel, which each
//! test paints with a distinct marker colour. That makes recognition output
//! a pure function of the crop, so ordering assertions stay valid even when
//! batches run concurrently and complete out of order.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use pageparse::backend::BackendError;
use pageparse::{
    parse_image, parse_pages, DocParseError, ParseConfig, ParseStatus, ParsedDocument,
    RecognitionBackend, RegionLabel,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Scripted backend ─────────────────────────────────────────────────────

enum RecognizeMode {
    /// One output per crop: `px{N} {T|R}` from the crop's top-left red
    /// channel and whether the prompt asked for a table.
    EchoPixel,
    /// Every call fails.
    Fail,
    /// Return one result fewer than requested.
    DropLast,
    /// Fail the first N calls, then echo.
    FlakyTimes(AtomicUsize),
}

struct ScriptedBackend {
    layouts: Mutex<VecDeque<Result<String, BackendError>>>,
    mode: RecognizeMode,
    recognize_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(layouts: Vec<Result<String, BackendError>>, mode: RecognizeMode) -> Arc<Self> {
        Arc::new(Self {
            layouts: Mutex::new(layouts.into_iter().collect()),
            mode,
            recognize_calls: AtomicUsize::new(0),
        })
    }

    fn echo(layout: &str) -> Arc<Self> {
        Self::new(vec![Ok(layout.to_string())], RecognizeMode::EchoPixel)
    }

    fn calls(&self) -> usize {
        self.recognize_calls.load(Ordering::SeqCst)
    }
}

fn echo_text(prompt: &str, crop: &RgbImage) -> String {
    let marker = crop.get_pixel(0, 0)[0];
    let kind = if prompt.contains("table") { "T" } else { "R" };
    format!("px{marker} {kind}")
}

#[async_trait]
impl RecognitionBackend for ScriptedBackend {
    async fn layout(&self, _image: &RgbImage) -> Result<String, BackendError> {
        self.layouts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Call("layout script exhausted".into())))
    }

    async fn recognize(
        &self,
        prompts: &[String],
        crops: &[RgbImage],
    ) -> Result<Vec<String>, BackendError> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            RecognizeMode::EchoPixel => Ok(prompts
                .iter()
                .zip(crops)
                .map(|(p, c)| echo_text(p, c))
                .collect()),
            RecognizeMode::Fail => Err(BackendError::Call("model exploded".into())),
            RecognizeMode::DropLast => Ok(prompts
                .iter()
                .zip(crops)
                .take(prompts.len().saturating_sub(1))
                .map(|(p, c)| echo_text(p, c))
                .collect()),
            RecognizeMode::FlakyTimes(remaining) => {
                if remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    Err(BackendError::Call("transient".into()))
                } else {
                    Ok(prompts
                        .iter()
                        .zip(crops)
                        .map(|(p, c)| echo_text(p, c))
                        .collect())
                }
            }
        }
    }
}

// ── Page builders ────────────────────────────────────────────────────────

/// A white square page with a marker pixel at each region's top-left corner.
fn page_with_markers(side: u32, corners: &[(u32, u32)]) -> RgbImage {
    let mut page = RgbImage::from_pixel(side, side, Rgb([255, 255, 255]));
    for (i, &(x, y)) in corners.iter().enumerate() {
        page.put_pixel(x, y, Rgb([i as u8 + 1, 0, 0]));
    }
    page
}

fn quiet_config() -> ParseConfig {
    ParseConfig::builder()
        .max_retries(0)
        .without_markdown()
        .build()
        .unwrap()
}

// ── Single image ─────────────────────────────────────────────────────────

#[tokio::test]
async fn single_image_produces_ordered_elements_and_outputs() {
    let save = TempDir::new().unwrap();
    let layout = "[10, 10, 390, 50] title \
                  [10, 60, 390, 100] para \
                  [10, 110, 390, 150] tab \
                  [10, 160, 200, 300] fig";
    let backend: Arc<dyn RecognitionBackend> = ScriptedBackend::echo(layout);
    let page = page_with_markers(400, &[(10, 10), (10, 60), (10, 110)]);

    let config = ParseConfig::builder()
        .save_dir(save.path())
        .max_retries(0)
        .build()
        .unwrap();
    let out = parse_image(page, "scan", &backend, &config).await.unwrap();

    let ParsedDocument::Image(elements) = &out.document else {
        panic!("expected an image result");
    };
    assert_eq!(elements.len(), 4);

    // Dense reading order in layout order, regardless of figure/text split.
    let orders: Vec<usize> = elements.iter().map(|e| e.reading_order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);

    assert_eq!(elements[0].label, RegionLabel::Title);
    assert_eq!(elements[0].text, "px1 R");
    assert_eq!(elements[1].text, "px2 R");
    // Table regions get the table prompt.
    assert_eq!(elements[2].text, "px3 T");

    // The figure crop exists on disk and the element references it.
    let fig = &elements[3];
    assert!(fig.label.is_figure());
    assert_eq!(fig.figure_path.as_deref(), Some("figures/scan_3.png"));
    assert_eq!(fig.text, "![Figure](figures/scan_3.png)");
    assert!(save.path().join("figures/scan_3.png").exists());

    // Persisted JSON carries structural trees; markdown starts at the title.
    let json_path = out.json_path.clone().unwrap();
    assert_eq!(json_path, save.path().join("recognition_json/scan.json"));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 4);
    assert_eq!(json[0]["parsed_content"]["type"], "text");
    assert_eq!(json[0]["bbox"][0], 10);

    let md = std::fs::read_to_string(out.markdown_path.as_ref().unwrap()).unwrap();
    assert!(md.starts_with("# px1 R"));
    assert!(md.contains("![Figure](figures/scan_3.png)"));

    assert_eq!(out.status(), ParseStatus::Complete);
    assert_eq!(out.stats.total_elements, 4);
}

#[tokio::test]
async fn figures_are_dropped_without_a_save_dir() {
    let layout = "[10, 10, 90, 50] fig [10, 60, 90, 90] para";
    let backend: Arc<dyn RecognitionBackend> = ScriptedBackend::echo(layout);
    let page = page_with_markers(100, &[(10, 60)]);

    let out = parse_image(page, "scan", &backend, &quiet_config())
        .await
        .unwrap();

    let ParsedDocument::Image(elements) = &out.document else {
        panic!("expected an image result");
    };
    // The figure vanishes and the paragraph still gets a dense order.
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].label, RegionLabel::Paragraph);
    assert_eq!(elements[0].reading_order, 0);
    assert!(out.json_path.is_none());
}

// ── Batching ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_batches_reassemble_in_layout_order() {
    let mut layout = String::new();
    let mut corners = Vec::new();
    for i in 0..9u32 {
        let y1 = 5 + 45 * i;
        layout.push_str(&format!("[10, {y1}, 400, {}] para ", y1 + 40));
        corners.push((10, y1));
    }
    let scripted = ScriptedBackend::new(vec![Ok(layout)], RecognizeMode::EchoPixel);
    let backend: Arc<dyn RecognitionBackend> = scripted.clone();
    let page = page_with_markers(420, &corners);

    let config = ParseConfig::builder()
        .max_batch_size(4)
        .batch_concurrency(3)
        .max_retries(0)
        .without_markdown()
        .build()
        .unwrap();
    let out = parse_image(page, "dense", &backend, &config).await.unwrap();

    let ParsedDocument::Image(elements) = &out.document else {
        panic!("expected an image result");
    };
    let texts: Vec<&str> = elements.iter().map(|e| e.text.as_str()).collect();
    let expected: Vec<String> = (1..=9).map(|i| format!("px{i} R")).collect();
    assert_eq!(texts, expected);

    // 9 elements at batch size 4 → exactly 3 calls.
    assert_eq!(scripted.calls(), 3);
}

#[tokio::test]
async fn length_mismatch_is_not_retried() {
    let layout = "[10, 10, 90, 40] para [10, 50, 90, 90] para";
    let scripted = ScriptedBackend::new(vec![Ok(layout.into())], RecognizeMode::DropLast);
    let backend: Arc<dyn RecognitionBackend> = scripted.clone();
    let page = page_with_markers(100, &[(10, 10), (10, 50)]);

    let config = ParseConfig::builder()
        .max_retries(3)
        .retry_backoff_ms(1)
        .without_markdown()
        .build()
        .unwrap();
    let err = parse_image(page, "scan", &backend, &config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DocParseError::AllPagesFailed { total: 1, .. }
    ));
    assert!(err.to_string().contains("results for"));
    assert_eq!(scripted.calls(), 1);
}

#[tokio::test]
async fn layout_failure_on_a_single_image_is_fatal_as_such() {
    let backend: Arc<dyn RecognitionBackend> = ScriptedBackend::new(
        vec![Err(BackendError::Call("layout model down".into()))],
        RecognizeMode::EchoPixel,
    );
    let page = page_with_markers(100, &[]);

    let err = parse_image(page, "scan", &backend, &quiet_config())
        .await
        .unwrap_err();
    assert!(matches!(err, DocParseError::LayoutFailed { .. }));
    assert!(err.to_string().contains("layout model down"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let layout = "[10, 10, 90, 90] para";
    let scripted = ScriptedBackend::new(
        vec![Ok(layout.into())],
        RecognizeMode::FlakyTimes(AtomicUsize::new(1)),
    );
    let backend: Arc<dyn RecognitionBackend> = scripted.clone();
    let page = page_with_markers(100, &[(10, 10)]);

    let config = ParseConfig::builder()
        .max_retries(2)
        .retry_backoff_ms(1)
        .without_markdown()
        .build()
        .unwrap();
    let out = parse_image(page, "scan", &backend, &config).await.unwrap();

    assert_eq!(out.document.element_count(), 1);
    assert_eq!(scripted.calls(), 2);
}

// ── Multi-page aggregation ───────────────────────────────────────────────

#[tokio::test]
async fn failed_page_preserves_earlier_pages() {
    let save = TempDir::new().unwrap();
    let scripted = ScriptedBackend::new(
        vec![
            Ok("[10, 10, 90, 90] para".into()),
            Err(BackendError::Call("model exploded".into())),
        ],
        RecognizeMode::EchoPixel,
    );
    let backend: Arc<dyn RecognitionBackend> = scripted.clone();
    let pages = vec![
        page_with_markers(100, &[(10, 10)]),
        page_with_markers(100, &[]),
    ];

    let config = ParseConfig::builder()
        .save_dir(save.path())
        .max_retries(0)
        .build()
        .unwrap();
    let out = parse_pages(pages, "report", "report.pdf", &backend, &config)
        .await
        .unwrap();

    assert_eq!(
        out.status(),
        ParseStatus::Partial {
            failed_pages: vec![2]
        }
    );

    let ParsedDocument::Pdf(doc) = &out.document else {
        panic!("expected a pdf result");
    };
    assert_eq!(doc.total_pages, 2);
    assert_eq!(doc.source_file, "report.pdf");
    assert_eq!(doc.pages[0].elements.len(), 1);
    assert!(doc.pages[0].error.is_none());
    assert!(doc.pages[1].elements.is_empty());
    assert!(doc.pages[1].error.is_some());

    // Combined JSON keeps the page structure and records the failure.
    let json_path = out.json_path.unwrap();
    assert_eq!(json_path, save.path().join("recognition_json/report.json"));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["pages"][0]["elements"][0]["text"], "px1 R");
    assert!(json["pages"][1].get("error").is_some());
}

#[tokio::test]
async fn all_pages_failing_is_fatal() {
    let backend: Arc<dyn RecognitionBackend> = ScriptedBackend::new(
        vec![
            Err(BackendError::Call("down".into())),
            Err(BackendError::Call("down".into())),
        ],
        RecognizeMode::EchoPixel,
    );
    let pages = vec![
        page_with_markers(100, &[]),
        page_with_markers(100, &[]),
    ];

    let err = parse_pages(pages, "report", "report.pdf", &backend, &quiet_config())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocParseError::AllPagesFailed { total: 2, .. }
    ));
}

#[tokio::test]
async fn markdown_joins_pages_with_a_separator() {
    let save = TempDir::new().unwrap();
    let backend: Arc<dyn RecognitionBackend> = ScriptedBackend::new(
        vec![
            Ok("[10, 10, 90, 90] para".into()),
            Ok("[10, 10, 90, 90] para".into()),
        ],
        RecognizeMode::EchoPixel,
    );
    let pages = vec![
        page_with_markers(100, &[(10, 10)]),
        page_with_markers(100, &[(10, 10)]),
    ];

    let config = ParseConfig::builder()
        .save_dir(save.path())
        .max_retries(0)
        .build()
        .unwrap();
    let out = parse_pages(pages, "two", "two.pdf", &backend, &config)
        .await
        .unwrap();

    let md = std::fs::read_to_string(out.markdown_path.unwrap()).unwrap();
    assert_eq!(md.matches("px1 R").count(), 2);
    assert!(md.contains("---"));

    // Figure names embed the page, so two pages cannot collide.
    assert_eq!(out.stats.processed_pages, 2);
}

#[tokio::test]
async fn unparseable_layout_yields_an_empty_page() {
    let backend: Arc<dyn RecognitionBackend> =
        ScriptedBackend::echo("no boxes in this response at all");
    let page = page_with_markers(100, &[]);

    let out = parse_image(page, "scan", &backend, &quiet_config())
        .await
        .unwrap();
    assert_eq!(out.document.element_count(), 0);
}
