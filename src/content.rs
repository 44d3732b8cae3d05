//! Content-addressed storage for full profile payloads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{SyncConfig, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Errors from a content store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the upload.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with something other than a content hash.
    #[error("invalid content store response: {0}")]
    InvalidResponse(String),
}

/// A blob store addressed by the hash of its content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their content address.
    async fn put(&self, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// In-process store addressed by hex SHA-256.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a blob by content address.
    pub async fn get(&self, hash: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(hash).cloned()
    }

    /// Number of `put` calls served so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let hash = hex::encode(Sha256::digest(&bytes));
        self.blobs.write().await.insert(hash.clone(), bytes);
        Ok(hash)
    }
}

/// Store backed by an IPFS node's HTTP API (`/api/v0/add`).
#[derive(Debug, Clone)]
pub struct IpfsContentStore {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: Option<String>,
}

impl IpfsContentStore {
    /// Create a store talking to the node at `api_url` with the default
    /// request timeout.
    pub fn new(api_url: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(api_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Create a store whose requests give up after `timeout`.
    ///
    /// A timed-out upload fails with [`StoreError::Unavailable`].
    pub fn with_timeout(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a store from the configured endpoint and timeout.
    pub fn from_config(config: &SyncConfig) -> Result<Self, StoreError> {
        Self::with_timeout(config.ipfs_api_url.clone(), config.request_timeout())
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add", self.api_url)
    }
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String, StoreError> {
        let part = Part::bytes(bytes)
            .file_name("profile.json")
            .mime_str("application/json")
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.add_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "IPFS add failed with {status}: {}",
                body.trim()
            )));
        }

        let hash = parse_add_response(&body)?;
        debug!(hash = %hash, "stored profile payload on IPFS");
        Ok(hash)
    }
}

/// Extract the content hash from an `/api/v0/add` response body.
///
/// The node streams one JSON object per line; the last one describes the
/// uploaded file.
pub fn parse_add_response(body: &str) -> Result<String, StoreError> {
    let last = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| StoreError::InvalidResponse("empty body".to_string()))?;

    let parsed: AddResponse =
        serde_json::from_str(last).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

    match parsed.hash {
        Some(hash) if !hash.is_empty() => Ok(hash),
        _ => Err(StoreError::InvalidResponse("missing Hash".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    /// Read one HTTP request, headers and body.
    async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return buf;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let done = match content_length {
                Some(len) => buf.len() >= end + 4 + len,
                None => buf.ends_with(b"0\r\n\r\n") || buf.ends_with(b"--\r\n"),
            };
            if done {
                return buf;
            }
        }
    }

    /// Serve a single request on a local port. `None` accepts the request
    /// and never answers.
    async fn serve_once(response: Option<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            match response {
                Some(response) => {
                    stream.write_all(response.as_bytes()).await.unwrap();
                    let _ = stream.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(60)).await,
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn put_via(url: String) -> Result<String, StoreError> {
        let store = IpfsContentStore::with_timeout(url, Duration::from_millis(300)).unwrap();
        tokio::time::timeout(Duration::from_secs(10), store.put(b"{}".to_vec()))
            .await
            .expect("put did not finish")
    }

    #[tokio::test]
    async fn test_ipfs_put_returns_hash() {
        let url = serve_once(Some(http_response(
            "200 OK",
            "{\"Name\":\"profile.json\",\"Hash\":\"QmProfileHash\",\"Size\":\"10\"}\n",
        )))
        .await;
        assert_eq!(put_via(url).await.unwrap(), "QmProfileHash");
    }

    #[tokio::test]
    async fn test_ipfs_put_uses_last_line_of_body() {
        let url = serve_once(Some(http_response(
            "200 OK",
            "{\"Name\":\"dir\",\"Hash\":\"QmFirst\"}\n{\"Name\":\"profile.json\",\"Hash\":\"QmSecond\"}\n",
        )))
        .await;
        assert_eq!(put_via(url).await.unwrap(), "QmSecond");
    }

    #[tokio::test]
    async fn test_ipfs_put_server_error() {
        let url = serve_once(Some(http_response(
            "500 Internal Server Error",
            "{\"Message\":\"repo locked\"}",
        )))
        .await;
        match put_via(url).await {
            Err(StoreError::Unavailable(reason)) => {
                assert!(reason.contains("500"), "{reason}");
                assert!(reason.contains("repo locked"), "{reason}");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ipfs_put_missing_hash() {
        let url = serve_once(Some(http_response("200 OK", "{\"Name\":\"profile.json\"}"))).await;
        assert!(matches!(
            put_via(url).await,
            Err(StoreError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_ipfs_put_times_out() {
        let url = serve_once(None).await;
        assert!(matches!(put_via(url).await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_ipfs_put_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(matches!(
            put_via(format!("http://{addr}")).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_is_content_addressed() {
        let store = MemoryContentStore::new();
        let a = store.put(b"{\"displayName\":\"Chioma\"}".to_vec()).await.unwrap();
        let b = store.put(b"{\"displayName\":\"Chioma\"}".to_vec()).await.unwrap();
        let c = store.put(b"{\"displayName\":\"Ada\"}".to_vec()).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert_eq!(store.put_count(), 3);
        assert_eq!(
            store.get(&a).await.unwrap(),
            b"{\"displayName\":\"Chioma\"}".to_vec()
        );
        assert!(store.get("missing").await.is_none());
    }

    #[test]
    fn test_parse_add_response() {
        let body = "{\"Name\":\"profile.json\",\"Hash\":\"bafybeigdyrzt6profilehash\",\"Size\":\"42\"}\n";
        assert_eq!(parse_add_response(body).unwrap(), "bafybeigdyrzt6profilehash");
    }

    #[test]
    fn test_parse_add_response_uses_last_line() {
        let body = "{\"Name\":\"a\",\"Hash\":\"first\"}\n{\"Name\":\"profile.json\",\"Hash\":\"second\"}\n\n";
        assert_eq!(parse_add_response(body).unwrap(), "second");
    }

    #[test]
    fn test_parse_add_response_rejects_garbage() {
        assert!(matches!(
            parse_add_response(""),
            Err(StoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_add_response("not json"),
            Err(StoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_add_response("{\"Name\":\"profile.json\"}"),
            Err(StoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_add_url() {
        let store = IpfsContentStore::new("http://localhost:5001/").unwrap();
        assert_eq!(store.add_url(), "http://localhost:5001/api/v0/add");
        let store = IpfsContentStore::from_config(&SyncConfig::default()).unwrap();
        assert_eq!(store.add_url(), "http://localhost:5001/api/v0/add");
    }
}
