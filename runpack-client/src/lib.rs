//! Runpack HTTP Client
//!
//! A type-safe HTTP client for the Runpack job-queue service.
//!
//! The client is stateless apart from its credentials: every runner-scoped
//! call takes the runner id explicitly.
//!
//! # Example
//!
//! ```no_run
//! use runpack_client::QueueClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), runpack_client::ClientError> {
//!     let client = QueueClient::new("http://localhost:8787", "secret-key");
//!
//!     let runner_id = client
//!         .register_runner("runner-1a2b3c4d", vec!["figpack_nwb_pose_estimation".to_string()])
//!         .await?;
//!
//!     println!("Registered as {}", runner_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod runners;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use runpack_core::domain::heartbeat::Heartbeat;
pub use runpack_core::domain::job::JobDescriptor;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the Runpack queue service
///
/// Methods are grouped by resource:
/// - Runner registration and verification
/// - Job discovery, claiming, heartbeats and terminal reports
#[derive(Clone)]
pub struct QueueClient {
    /// Base URL of the queue service (e.g., "http://localhost:8787")
    base_url: String,
    /// Runner API key sent as a bearer token
    api_key: String,
    /// HTTP client instance
    client: Client,
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl QueueClient {
    /// Create a new queue client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the queue service
    /// * `api_key` - Runner API key used for authentication
    ///
    /// # Example
    /// ```
    /// use runpack_client::QueueClient;
    ///
    /// let client = QueueClient::new("http://localhost:8787", "secret-key");
    /// ```
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a new queue client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use runpack_client::QueueClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = QueueClient::with_client("http://localhost:8787", "secret-key", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the queue service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of an endpoint below the base URL
    ///
    /// Each segment is percent-encoded, so ids containing `/` or `?` stay a
    /// single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .client
            .get(self.endpoint(segments)?)
            .bearer_auth(&self.api_key))
    }

    fn post(&self, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .client
            .post(self.endpoint(segments)?)
            .bearer_auth(&self.api_key))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response whose body is ignored
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = QueueClient::new("http://localhost:8787", "key");
        assert_eq!(client.base_url(), "http://localhost:8787");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = QueueClient::new("http://localhost:8787/", "key");
        assert_eq!(client.base_url(), "http://localhost:8787");
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let client = QueueClient::new("http://localhost:8787/queue/", "key");
        let url = client.endpoint(&["api", "jobs", "a/b?c", "claim"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8787/queue/api/jobs/a%2Fb%3Fc/claim");
    }

    #[test]
    fn test_endpoint_rejects_invalid_base_url() {
        let client = QueueClient::new("not a url", "key");
        let err = client.endpoint(&["api"]).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = QueueClient::new("http://localhost:8787", "super-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
