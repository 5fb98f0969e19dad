//! HTTP client wrapper for fetching artifacts from a candidate.
//!
//! This module provides the `HttpClient` struct, which issues one GET per
//! call and buffers the full body so it can be validated before anything
//! touches the disk.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::HOST;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::directory::ServerCandidate;
use crate::user_agent;

/// HTTP client for artifact downloads.
///
/// Created once per run and reused for every attempt, taking advantage of
/// connection pooling. Every request is bounded by the connect timeout and
/// the total request timeout.
///
/// Redirects are never followed: a request may carry a `Host` override that
/// belongs to the candidate, not to wherever the candidate points.
///
/// # Example
///
/// ```no_run
/// use sigmirror_core::directory::ServerCandidate;
/// use sigmirror_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let candidate = ServerCandidate::from_authority("mirror.example.org");
/// let body = client.fetch(&candidate, "daily.cvd").await?;
/// println!("received {} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// `read_timeout` bounds the whole request, body included.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn new_with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .gzip(true)
            .redirect(Policy::none())
            .user_agent(user_agent::default_download_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `file_name` from `candidate` and returns the full body.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The candidate produces an invalid URL
    /// - The request fails (network error, timeout)
    /// - The server returns a non-success status, redirects included
    /// - The body is shorter than the announced Content-Length
    #[instrument(skip(self), fields(candidate = %candidate))]
    pub async fn fetch(
        &self,
        candidate: &ServerCandidate,
        file_name: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let url = candidate.url_for(file_name);
        Url::parse(&url).map_err(|_| DownloadError::invalid_url(url.clone()))?;

        let mut request = self.client.get(&url);
        if let Some(host) = candidate.host_header() {
            request = request.header(HOST, host);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(&url, e))?;

        let status = response.status();
        if status.is_redirection() {
            debug!(
                status = status.as_u16(),
                location = ?response.headers().get(reqwest::header::LOCATION),
                "redirect not followed"
            );
            return Err(DownloadError::http_status(&url, status.as_u16()));
        }
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success response");
            return Err(DownloadError::http_status(&url, status.as_u16()));
        }

        let content_length = response.content_length();
        let body = read_body(response, &url).await?;

        if let Some(expected) = content_length
            && expected != body.len() as u64
        {
            return Err(DownloadError::integrity(&url, expected, body.len() as u64));
        }

        debug!(bytes = body.len(), "body received");
        Ok(body)
    }
}

/// Streams the response body into memory.
async fn read_body(response: reqwest::Response, url: &str) -> Result<Vec<u8>, DownloadError> {
    let capacity = response
        .content_length()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
