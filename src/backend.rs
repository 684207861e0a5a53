//! The recognition backend seam: layout detection and batched recognition.
//!
//! The model's single chat-style interface is split into two capability
//! methods so the pipeline never depends on one backend implementation:
//!
//! * [`RecognitionBackend::layout`] — full page image → layout string
//! * [`RecognitionBackend::recognize`] — batch of (prompt, crop) pairs →
//!   one output string per input, same order
//!
//! A test double implements both trivially (see `tests/pipeline.rs`); the
//! bundled [`HttpBackend`] speaks a small JSON protocol for backends hosted
//! behind HTTP.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a backend call. The pipeline maps these onto page-level
/// failures; they never abort other pages.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Transport or model-side failure.
    #[error("backend call failed: {0}")]
    Call(String),

    /// The backend broke the length-preserving contract.
    #[error("backend returned {got} results for {expected} inputs")]
    LengthMismatch { expected: usize, got: usize },
}

/// A recognition backend: layout detection plus batched content recognition.
///
/// `recognize` must be length-preserving and order-preserving: exactly one
/// output string per input pair, in input order. Partial-batch failure is
/// not part of the contract — a failed call fails the whole batch.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Detect the layout and reading order of a full page image.
    async fn layout(&self, image: &RgbImage) -> Result<String, BackendError>;

    /// Recognize the content of each cropped region. `prompts` and `crops`
    /// always have equal length, at most the configured batch size.
    async fn recognize(
        &self,
        prompts: &[String],
        crops: &[RgbImage],
    ) -> Result<Vec<String>, BackendError>;
}

// ── HTTP backend ─────────────────────────────────────────────────────────

/// Backend implementation for a model hosted behind HTTP.
///
/// Protocol: `POST {base}/layout` with `{"prompt", "image"}` returns
/// `{"result"}`; `POST {base}/recognize` with `{"prompts", "images"}`
/// returns `{"results"}`. Images travel as base64 PNG — lossless, so text
/// crispness survives the trip (JPEG artefacts on rendered text measurably
/// hurt recognition accuracy).
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct LayoutRequest<'a> {
    prompt: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct LayoutResponse {
    result: String,
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    prompts: &'a [String],
    images: Vec<String>,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    results: Vec<String>,
}

impl HttpBackend {
    /// Create a backend for the given base URL, e.g. `http://localhost:8501`.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::Call(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Call(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Call(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::Call(format!("invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl RecognitionBackend for HttpBackend {
    async fn layout(&self, image: &RgbImage) -> Result<String, BackendError> {
        let request = LayoutRequest {
            prompt: crate::prompts::LAYOUT_PROMPT,
            image: png_base64(image)?,
        };
        let response: LayoutResponse = self.post("layout", &request).await?;
        Ok(response.result)
    }

    async fn recognize(
        &self,
        prompts: &[String],
        crops: &[RgbImage],
    ) -> Result<Vec<String>, BackendError> {
        let images: Result<Vec<String>, BackendError> = crops.iter().map(png_base64).collect();
        let request = RecognizeRequest {
            prompts,
            images: images?,
        };
        let response: RecognizeResponse = self.post("recognize", &request).await?;

        if response.results.len() != prompts.len() {
            return Err(BackendError::LengthMismatch {
                expected: prompts.len(),
                got: response.results.len(),
            });
        }
        Ok(response.results)
    }
}

/// Encode an image as base64 PNG for the request body.
fn png_base64(img: &RgbImage) -> Result<String, BackendError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| BackendError::Call(format!("PNG encoding failed: {e}")))?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded crop → {} bytes base64", b64.len());
    Ok(b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_base64_produces_valid_base64() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0]));
        let b64 = png_base64(&img).unwrap();
        let decoded = STANDARD.decode(&b64).unwrap();
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8501/", 30).unwrap();
        assert_eq!(backend.base_url, "http://localhost:8501");
    }

    #[test]
    fn length_mismatch_display() {
        let e = BackendError::LengthMismatch {
            expected: 4,
            got: 3,
        };
        assert!(e.to_string().contains("3 results for 4 inputs"));
    }
}
