//! DOI registry client

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use super::csl;
use super::error::ResolveError;
use crate::domain::{Doi, Format, RawMetadata};

/// Media type for content-negotiated CSL-JSON
pub const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// Longest payload excerpt written to the log for a bad response
const LOG_EXCERPT: usize = 512;

/// Fetches metadata for DOIs.
///
/// Implementations perform exactly one attempt per call. Retrying is left to
/// the caller so that retries compose with request coalescing.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Fetches metadata for an already validated DOI
    async fn fetch(&self, doi: &Doi, format: Format) -> Result<RawMetadata, ResolveError>;

    /// Validates `input` as a DOI, then fetches it
    async fn resolve(&self, input: &str, format: Format) -> Result<RawMetadata, ResolveError> {
        let doi: Doi = input.parse()?;
        self.fetch(&doi, format).await
    }
}

/// Resolver backed by an HTTP DOI registry such as `https://doi.org`
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    registry: Url,
}

impl HttpResolver {
    pub fn new(registry_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let registry = Url::parse(registry_url)
            .with_context(|| format!("Invalid registry URL: {}", registry_url))?;
        if registry.cannot_be_a_base() {
            bail!("Invalid registry URL: {}", registry_url);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, registry })
    }

    /// `{registry}/{doi}` with each DOI path segment percent-encoded
    fn endpoint(&self, doi: &Doi) -> Url {
        let mut url = self.registry.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(doi.as_str().split('/'));
        }
        url
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn fetch(&self, doi: &Doi, format: Format) -> Result<RawMetadata, ResolveError> {
        let url = self.endpoint(doi);
        debug!(doi = %doi, format = %format, url = %url, "fetching metadata");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, CSL_JSON)
            .send()
            .await
            .map_err(|e| classify_transport(doi, e))?;

        let status = response.status();
        debug!(doi = %doi, status = status.as_u16(), "registry responded");

        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Err(ResolveError::NotFound(doi.clone())),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Err(ResolveError::network(doi, format!("HTTP {}", status)));
            }
            s if s.is_server_error() => {
                return Err(ResolveError::network(doi, format!("HTTP {}", status)));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(doi, e))?;

        if !status.is_success() {
            warn!(doi = %doi, status = status.as_u16(), body = %excerpt(&body), "unexpected registry status");
            return Err(ResolveError::unexpected(doi, format!("HTTP {}", status)));
        }

        csl::parse(doi, &body).inspect_err(|e| {
            warn!(doi = %doi, error = %e, body = %excerpt(&body), "unparseable registry payload");
        })
    }
}

fn classify_transport(doi: &Doi, err: reqwest::Error) -> ResolveError {
    if err.is_redirect() || err.is_builder() {
        ResolveError::unexpected(doi, err.to_string())
    } else if err.is_timeout() {
        ResolveError::network(doi, "request timed out")
    } else {
        ResolveError::network(doi, err.to_string())
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(LOG_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn resolver(url: &str) -> HttpResolver {
        HttpResolver::new(url, Duration::from_secs(5), "citekeep-test").unwrap()
    }

    fn body() -> String {
        json!({
            "type": "article-journal",
            "title": "Quantum Foo",
            "author": [{"given": "Anna", "family": "Müller"}],
            "issued": {"date-parts": [[2020]]}
        })
        .to_string()
    }

    #[tokio::test]
    async fn fetches_csl_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/10.1000/xyz123")
            .match_header("accept", CSL_JSON)
            .with_status(200)
            .with_header("content-type", CSL_JSON)
            .with_body(body())
            .expect(1)
            .create_async()
            .await;

        let meta = resolver(&server.url())
            .resolve("https://doi.org/10.1000/xyz123", Format::Bib)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(meta.doi.as_str(), "10.1000/xyz123");
        assert_eq!(meta.title.as_deref(), Some("Quantum Foo"));
        assert_eq!(meta.year, Some(2020));
    }

    #[tokio::test]
    async fn not_found_is_terminal() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/10.1000/doesnotexist")
            .with_status(404)
            .with_body("DOI Not Found")
            .create_async()
            .await;

        let err = resolver(&server.url())
            .resolve("10.1000/doesnotexist", Format::Bib)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let mut server = Server::new_async().await;
        for status in [503, 429, 408] {
            let path = format!("/10.1000/busy{}", status);
            server
                .mock("GET", path.as_str())
                .with_status(status)
                .create_async()
                .await;

            let err = resolver(&server.url())
                .resolve(&path[1..], Format::Bib)
                .await
                .unwrap_err();

            assert!(err.is_retryable(), "status {} gave {:?}", status, err);
        }
    }

    #[tokio::test]
    async fn bad_status_and_payload_are_unexpected() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/10.1000/bad")
            .with_status(400)
            .create_async()
            .await;
        server
            .mock("GET", "/10.1000/html")
            .with_status(200)
            .with_body("<html>not metadata</html>")
            .create_async()
            .await;

        let client = resolver(&server.url());
        for doi in ["10.1000/bad", "10.1000/html"] {
            let err = client.resolve(doi, Format::Bib).await.unwrap_err();
            assert!(matches!(err, ResolveError::UnexpectedResponse { .. }), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn invalid_doi_fails_before_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = resolver(&server.url())
            .resolve("not a doi", Format::Bib)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ResolveError::InvalidDoi(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_network_error() {
        let err = resolver("http://127.0.0.1:1")
            .resolve("10.1000/xyz123", Format::Bib)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Network { .. }), "{:?}", err);
    }

    #[test]
    fn endpoint_keeps_registry_path() {
        let doi: Doi = "10.1000/xyz123".parse().unwrap();
        let url = resolver("https://example.org/doi/").endpoint(&doi);
        assert_eq!(url.as_str(), "https://example.org/doi/10.1000/xyz123");

        let url = resolver("https://doi.org").endpoint(&doi);
        assert_eq!(url.as_str(), "https://doi.org/10.1000/xyz123");
    }

    #[test]
    fn rejects_invalid_registry_url() {
        assert!(HttpResolver::new("not a url", Duration::from_secs(1), "ua").is_err());
        assert!(HttpResolver::new("mailto:x@y.z", Duration::from_secs(1), "ua").is_err());
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(LOG_EXCERPT + 10);
        assert_eq!(excerpt(&long).chars().count(), LOG_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }
}
