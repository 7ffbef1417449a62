//! Downloads the source archive.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::FetchError;

/// Performs one GET against `url` and returns the whole body.
///
/// No retries: a non-success status or transport failure is returned as a
/// [`FetchError`] and the caller decides what to do.
#[tracing::instrument(skip(client))]
pub async fn fetch_archive<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;

    let status = resp.status();
    debug!(%status, "Feed responded");
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = resp.bytes().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;
    info!(bytes = body.len(), "Feed archive downloaded");

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedClient {
        status: u16,
        body: &'static [u8],
        calls: AtomicUsize,
    }

    impl CannedClient {
        fn new(status: u16, body: &'static [u8]) -> Self {
            Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            assert_eq!(req.method(), reqwest::Method::GET);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body.to_vec())
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let client = CannedClient::new(200, b"PK\x03\x04");
        let bytes = fetch_archive(&client, "http://feeds.test/gtfs.zip")
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"PK\x03\x04");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_error_without_retry() {
        let client = CannedClient::new(503, b"down for maintenance");
        let err = fetch_archive(&client, "http://feeds.test/gtfs.zip")
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 503),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let client = CannedClient::new(200, b"");
        let err = fetch_archive(&client, "not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
