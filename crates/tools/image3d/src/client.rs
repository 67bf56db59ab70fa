//! Model generation service HTTP client

use crate::types::{GenerationError, ImageAsset, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Default generation service URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Path of the generation endpoint
pub const DEFAULT_ENDPOINT: &str = "/api/generate";

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Default timeout for a generation request (2 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of retries: none, so failures surface promptly
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default base delay for exponential backoff (500 ms)
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Anything that turns an image into mesh bytes
///
/// The pipeline depends on this seam rather than on HTTP directly.
#[async_trait]
pub trait MeshFetcher: Send + Sync {
    /// Request a mesh for `image`; the returned bytes are not interpreted
    async fn fetch_model(&self, image: &ImageAsset) -> Result<Vec<u8>>;
}

/// Error body returned by the generation service
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    error: String,
}

/// HTTP client for the generation service
///
/// # Example
///
/// ```no_run
/// use image3d::{GenerateClient, ImageAsset, MeshFetcher};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = GenerateClient::new("http://localhost:5000");
///     let image = ImageAsset::from_path("chair.png")?;
///
///     let mesh = client.fetch_model(&image).await?;
///     std::fs::write("generated_model.obj", mesh)?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: Client,
    base_url: String,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    base_delay_ms: u64,
}

impl GenerateClient {
    /// Create a client for the service at `server_url`
    ///
    /// # Arguments
    ///
    /// * `server_url` - Base URL of the generation service (e.g., "http://localhost:5000").
    ///   A trailing slash is ignored; the endpoint path is appended per request.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: server_url.into().trim_end_matches('/').to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }

    /// Set the endpoint path (default `/api/generate`)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = if endpoint.starts_with('/') {
            endpoint
        } else {
            format!("/{endpoint}")
        };
        self
    }

    /// Set the per-attempt request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries for network and 5xx failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff (in milliseconds)
    pub fn with_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_delay_ms = delay_ms;
        self
    }

    /// Full URL of the generation endpoint
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    async fn fetch_once(&self, image: &ImageAsset) -> Result<Vec<u8>> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.media_type())
            .map_err(|e| {
                GenerationError::Validation(format!(
                    "media type {} is not valid: {e}",
                    image.media_type()
                ))
            })?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(self.url())
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(service_error(status, response).await);
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if is_json {
            return Err(GenerationError::MalformedResponse(format!(
                "expected mesh content, got JSON: {}",
                String::from_utf8_lossy(&body[..body.len().min(200)])
            )));
        }
        if body.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "response body is empty".to_string(),
            ));
        }
        Ok(body.to_vec())
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Network(format!(
                "request timed out after {}s",
                self.timeout.as_secs_f32()
            ))
        } else if e.is_connect() {
            GenerationError::Network(format!("failed to connect to {}", self.base_url))
        } else {
            GenerationError::Network(e.to_string())
        }
    }

    /// Calculate exponential backoff delay for retry attempts
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
impl MeshFetcher for GenerateClient {
    /// Upload `image` and return the generated mesh bytes
    ///
    /// Sends one multipart `POST` with the image under the `image` field,
    /// carrying its file name and media type. With retries configured,
    /// retryable failures are attempted again after an exponential backoff.
    ///
    /// # Arguments
    ///
    /// * `image` - Source image; its bytes are sent as-is
    ///
    /// # Returns
    ///
    /// Returns the raw response body of a 2xx reply. The bytes are not
    /// parsed here; loading them is the mesh loader's job.
    ///
    /// # Errors
    ///
    /// * [`GenerationError::Validation`] - the media type is not a valid MIME type
    /// * [`GenerationError::Network`] - connection failure, transport error or
    ///   timeout (retryable)
    /// * [`GenerationError::Service`] - non-2xx status, with the message taken
    ///   from a JSON `{"error": ...}` body, else the body text, else the status
    ///   reason (retryable for 5xx only)
    /// * [`GenerationError::MalformedResponse`] - 2xx with a JSON content type
    ///   or an empty body
    async fn fetch_model(&self, image: &ImageAsset) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(image).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.calculate_backoff_delay(attempt);
                    tracing::warn!(attempt = attempt + 1, ?delay, error = %e, "retrying generation");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for GenerateClient {
    /// Create a client with default localhost URL
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

async fn service_error(status: StatusCode, response: Response) -> GenerationError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ServiceErrorBody>(&text)
        .map(|body| body.error)
        .ok()
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    GenerationError::Service {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GenerateClient::new("http://localhost:5000/");
        assert_eq!(client.base_url, "http://localhost:5000");
        assert_eq!(client.url(), "http://localhost:5000/api/generate");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert_eq!(client.max_retries, 0);
    }

    #[test]
    fn test_client_configuration() {
        let client = GenerateClient::new("http://gen:8080")
            .with_endpoint("v2/generate")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(2)
            .with_base_delay_ms(100);

        assert_eq!(client.url(), "http://gen:8080/v2/generate");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.max_retries, 2);
        assert_eq!(client.base_delay_ms, 100);
    }

    #[test]
    fn test_backoff_delay_calculation() {
        let client = GenerateClient::default();
        assert_eq!(client.calculate_backoff_delay(0), Duration::from_millis(500));
        assert_eq!(client.calculate_backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(client.calculate_backoff_delay(3), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_invalid_media_type_is_validation_error() {
        let client = GenerateClient::new("http://127.0.0.1:9");
        let image = ImageAsset::new(b"data".to_vec(), "not a mime", "x.png");
        let err = client.fetch_model(&image).await.unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)), "{err:?}");
    }
}
