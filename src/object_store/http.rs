use super::ObjectStore;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_ATTEMPTS: usize = 3;

/// Path-style HTTP adapter for a MinIO-compatible object store.
///
/// Transient failures (connect errors, timeouts, 5xx) are retried with
/// exponential backoff and jitter; 4xx responses are fatal and surface
/// immediately so the job is marked failed rather than retried forever.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.endpoint, path)
    }

    async fn send_with_retry(&self, build: impl Fn() -> reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..RETRY_ATTEMPTS {
            let response = build().timeout(REQUEST_TIMEOUT).send().await;

            match response {
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt + 1 == RETRY_ATTEMPTS {
                        return Err(anyhow!("object store error: {}", resp.status()));
                    }
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == RETRY_ATTEMPTS {
                        return Err(anyhow!(e));
                    }
                }
            }

            let jitter = rand::random::<u64>() % 50;
            tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
            delay_ms = (delay_ms * 2).min(1200);
        }

        Err(anyhow!("retry attempts exhausted"))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = self
            .send_with_retry(|| self.client.get(self.url("/")))
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("list buckets failed: {}", response.status()));
        }
        let body = response.text().await?;
        Ok(parse_bucket_names(&body))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .send_with_retry(|| self.client.get(self.url(&format!("/{bucket}/{key}"))))
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "get {}/{} failed: {}",
                bucket,
                key,
                response.status()
            ));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let response = self
            .send_with_retry(|| {
                self.client
                    .put(self.url(&format!("/{bucket}/{key}")))
                    .body(data.clone())
            })
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "put {}/{} failed: {}",
                bucket,
                key,
                response.status()
            ));
        }
        Ok(())
    }
}

/// Pulls the `<Name>` entries out of a ListAllMyBuckets XML body. Naive on
/// purpose: the dashboard needs bucket names, not an S3 client.
fn parse_bucket_names(body: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("<Name>") {
        rest = &rest[start + "<Name>".len()..];
        if let Some(end) = rest.find("</Name>") {
            names.push(rest[..end].to_string());
            rest = &rest[end..];
        } else {
            break;
        }
    }
    names
}
