//! Element pipeline: classify regions, batch recognition calls, reassemble
//! in reading order.
//!
//! For each region surviving layout parsing and coordinate mapping:
//!
//! * **figure** — crop persisted to `figures/{name}_{order}.png`, element
//!   built directly, no recognition call;
//! * **everything else** — crop queued with a label-chosen prompt, then
//!   dispatched in batches of at most `max_batch_size`.
//!
//! Batch boundaries ignore element type (mixed text/table batches are
//! fine). Batches may be issued concurrently, but results are always put
//! back by batch index — never completion order — and the merged
//! figure + recognized list is sorted once by `reading_order`, the single
//! authoritative ordering step for the page.
//!
//! Per-region failures (bad layout entry, degenerate box) are absorbed here
//! with a `warn!`; a failed batch call fails the whole page since the
//! backend has no partial-batch semantics.

use crate::backend::{BackendError, RecognitionBackend};
use crate::config::ParseConfig;
use crate::error::PageError;
use crate::geometry::{map_region, Box2D};
use crate::layout::{parse_layout_string, RegionLabel};
use crate::output::RecognizedElement;
use crate::persist;
use crate::pipeline::prepare::PaddedImage;
use crate::prompts::recognition_prompt;
use futures::stream::{self, StreamExt};
use image::{imageops, RgbImage};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// A non-figure region waiting for recognition.
struct QueuedElement {
    crop: RgbImage,
    prompt: String,
    label: RegionLabel,
    bbox: Box2D,
    reading_order: usize,
}

/// Run the element pipeline for one page.
///
/// `image_name` seeds figure crop filenames and must be unique per page
/// (established before any dispatch, so concurrent documents cannot collide).
pub async fn process_elements(
    layout: &str,
    padded: &PaddedImage,
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
    save_dir: Option<&Path>,
    image_name: &str,
    page_number: usize,
) -> Result<Vec<RecognizedElement>, PageError> {
    let entries = parse_layout_string(layout);
    debug!(
        "Page {page_number}: {} layout entries from {} chars",
        entries.len(),
        layout.len()
    );

    let mut figure_elements: Vec<RecognizedElement> = Vec::new();
    let mut queued: Vec<QueuedElement> = Vec::new();
    let mut previous_box: Option<Box2D> = None;
    let mut reading_order = 0usize;

    for entry in entries {
        let mapped = match map_region(
            entry.bbox,
            &padded.dims,
            previous_box,
            config.monotonicity_tolerance_px,
        ) {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    "Page {page_number}: skipping {} region: {e}",
                    entry.label.as_token()
                );
                continue;
            }
        };
        previous_box = Some(mapped.original);

        let [x1, y1, x2, y2] = mapped.inference;
        let crop = imageops::crop_imm(&padded.image, x1, y1, x2 - x1, y2 - y1).to_image();

        if entry.label.is_figure() {
            let Some(dir) = save_dir else {
                debug!("Page {page_number}: no save dir, dropping figure crop");
                continue;
            };
            match persist::save_figure(&crop, dir, image_name, reading_order) {
                Ok(filename) => {
                    figure_elements.push(RecognizedElement {
                        label: entry.label,
                        bbox: Some(mapped.original),
                        text: format!("![Figure](figures/{filename})"),
                        figure_path: Some(format!("figures/{filename}")),
                        reading_order,
                        parsed_content: None,
                    });
                }
                Err(e) => {
                    warn!("Page {page_number}: failed to save figure crop: {e}");
                    continue;
                }
            }
        } else {
            queued.push(QueuedElement {
                crop,
                prompt: recognition_prompt(entry.label).to_string(),
                label: entry.label,
                bbox: mapped.original,
                reading_order,
            });
        }

        reading_order += 1;
    }

    // Dispatch recognition in batches, reassembling by batch index.
    let mut elements = figure_elements;
    if !queued.is_empty() {
        let batch_texts = dispatch_batches(&queued, backend, config, page_number).await?;
        for (elem, text) in queued.into_iter().zip(batch_texts) {
            elements.push(RecognizedElement {
                label: elem.label,
                bbox: Some(elem.bbox),
                text: text.trim().to_string(),
                figure_path: None,
                reading_order: elem.reading_order,
                parsed_content: None,
            });
        }
    }

    elements.sort_by_key(|e| e.reading_order);
    Ok(elements)
}

/// Dispatch all queued elements in `max_batch_size` chunks and return one
/// text per element, in queue order.
async fn dispatch_batches(
    queued: &[QueuedElement],
    backend: &Arc<dyn RecognitionBackend>,
    config: &ParseConfig,
    page_number: usize,
) -> Result<Vec<String>, PageError> {
    let batches: Vec<(usize, Vec<String>, Vec<RgbImage>)> = queued
        .chunks(config.max_batch_size)
        .enumerate()
        .map(|(i, chunk)| {
            let prompts = chunk.iter().map(|e| e.prompt.clone()).collect();
            let crops = chunk.iter().map(|e| e.crop.clone()).collect();
            (i, prompts, crops)
        })
        .collect();
    let batch_count = batches.len();
    debug!("Page {page_number}: {} elements in {batch_count} batches", queued.len());

    let mut outcomes: Vec<(usize, Result<Vec<String>, BackendError>)> =
        stream::iter(batches.into_iter().map(|(i, prompts, crops)| {
            let backend = Arc::clone(backend);
            let config = config.clone();
            async move {
                let result = call_with_retries(&backend, &prompts, &crops, &config).await;
                (i, result)
            }
        }))
        .buffer_unordered(config.batch_concurrency)
        .collect()
        .await;

    // Completion order is meaningless; batch index is authoritative.
    outcomes.sort_by_key(|(i, _)| *i);

    let mut texts = Vec::with_capacity(queued.len());
    for (batch_index, outcome) in outcomes {
        match outcome {
            Ok(batch_texts) => texts.extend(batch_texts),
            Err(e) => {
                return Err(PageError::BatchFailed {
                    page: page_number,
                    batch: batch_index,
                    detail: e.to_string(),
                });
            }
        }
    }
    Ok(texts)
}

/// One batch call with exponential backoff, enforcing the length-preserving
/// contract on success.
async fn call_with_retries(
    backend: &Arc<dyn RecognitionBackend>,
    prompts: &[String],
    crops: &[RgbImage],
    config: &ParseConfig,
) -> Result<Vec<String>, BackendError> {
    let mut last_err: Option<BackendError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Batch retry {attempt}/{} after {backoff}ms",
                config.max_retries
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match backend.recognize(prompts, crops).await {
            Ok(results) if results.len() == prompts.len() => return Ok(results),
            Ok(results) => {
                // A miscounting backend will miscount again; don't retry.
                return Err(BackendError::LengthMismatch {
                    expected: prompts.len(),
                    got: results.len(),
                });
            }
            Err(e) => {
                warn!("Batch attempt {} failed: {e}", attempt + 1);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| BackendError::Call("unknown error".into())))
}
