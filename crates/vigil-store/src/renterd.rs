// SPDX-License-Identifier: Apache-2.0

use crate::retry::{is_retryable_status, BackoffPolicy, RetryPolicy};
use crate::{AlertSink, ObjectStore};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use vigil_core::{AuditError, ErrorCode};
use vigil_model::{Alert, ObjectEntry, PrunableContract, ReclaimOutcome, RedundancySettings};

pub const LIST_PAGE_LIMIT: usize = 1000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ERROR_BODY: usize = 512;

/// Bus and worker API roots plus their passwords. Both APIs use basic auth
/// with an empty user name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenterdEndpoints {
    pub bus: String,
    pub bus_password: String,
    pub worker: String,
    pub worker_password: String,
}

pub struct RenterdBackend {
    endpoints: RenterdEndpoints,
    retry: RetryPolicy,
    client: Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    has_more: bool,
    #[serde(default, alias = "entries")]
    objects: Vec<ObjectEntry>,
}

#[derive(Deserialize)]
struct UploadSettings {
    redundancy: RedundancySettings,
}

#[derive(Deserialize)]
struct PrunableResponse {
    #[serde(default)]
    contracts: Vec<PrunableContract>,
}

#[derive(Serialize)]
struct PruneRequest {
    timeout: u64,
}

#[derive(Deserialize)]
struct PruneResponse {
    #[serde(default)]
    pruned: u64,
    #[serde(default)]
    remaining: u64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone, Copy)]
enum Api {
    Bus,
    Worker,
}

impl RenterdBackend {
    pub fn new(endpoints: RenterdEndpoints) -> Result<Self, AuditError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuditError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            endpoints: RenterdEndpoints {
                bus: endpoints.bus.trim_end_matches('/').to_string(),
                worker: endpoints.worker.trim_end_matches('/').to_string(),
                ..endpoints
            },
            retry: RetryPolicy::default(),
            client,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn endpoints(&self) -> &RenterdEndpoints {
        &self.endpoints
    }

    fn url(&self, api: Api, path: &str) -> String {
        let base = match api {
            Api::Bus => &self.endpoints.bus,
            Api::Worker => &self.endpoints.worker,
        };
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn request(&self, api: Api, method: reqwest::Method, url: &str) -> RequestBuilder {
        let password = match api {
            Api::Bus => &self.endpoints.bus_password,
            Api::Worker => &self.endpoints.worker_password,
        };
        self.client
            .request(method, url)
            .basic_auth("", Some(password))
    }

    /// GET with linear-backoff retries on transport errors and transient
    /// statuses.
    #[instrument(name = "renterd_get_json", skip(self, query))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        api: ApiTag,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, AuditError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = self
                .request(api.0, reqwest::Method::GET, url)
                .query(query);
            let failure = match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(|e| {
                        AuditError::new(
                            ErrorCode::Store,
                            format!("failed to decode response from {url}: {e}"),
                        )
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let err = status_error(url, resp).await;
                    if !is_retryable_status(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => transport_error(url, &e),
            };
            if !self.retry.allows_retry(attempt) {
                return Err(failure);
            }
            debug!(attempt, error = %failure, "retrying store request");
            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
        }
    }
}

/// Which API a request targets; wrapped so it shows up in span fields.
#[derive(Clone, Copy)]
struct ApiTag(Api);

impl std::fmt::Debug for ApiTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            Api::Bus => "bus",
            Api::Worker => "worker",
        })
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> AuditError {
    let code = if err.is_timeout() {
        ErrorCode::Timeout
    } else if err.is_connect() {
        ErrorCode::StoreUnreachable
    } else {
        ErrorCode::Store
    };
    AuditError::new(code, format!("request to {url} failed: {err}"))
}

async fn status_error(url: &str, resp: Response) -> AuditError {
    let status = resp.status();
    let body: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    let body = body.trim();
    let code = if status == StatusCode::NOT_FOUND {
        ErrorCode::NotFound
    } else {
        ErrorCode::Store
    };
    if body.is_empty() {
        AuditError::new(code, format!("{url} returned {status}"))
    } else {
        AuditError::new(code, format!("{url} returned {status}: {body}"))
    }
}

async fn expect_success(url: &str, resp: Response) -> Result<Response, AuditError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(status_error(url, resp).await)
    }
}

fn object_path(key: &str) -> String {
    format!("objects/{}", key.trim_start_matches('/'))
}

#[async_trait]
impl ObjectStore for RenterdBackend {
    fn backend_tag(&self) -> &'static str {
        "renterd"
    }

    #[instrument(name = "renterd_ping", skip(self))]
    async fn ping(&self) -> Result<(), AuditError> {
        for (api, name) in [(Api::Bus, "bus"), (Api::Worker, "worker")] {
            let url = self.url(api, "state");
            self.get_json::<serde_json::Value>(ApiTag(api), &url, &[])
                .await
                .map_err(|e| {
                    AuditError::new(
                        ErrorCode::StoreUnreachable,
                        format!("failed to reach {name} at {url}; {e}"),
                    )
                })?;
        }
        Ok(())
    }

    #[instrument(name = "renterd_put_object", skip(self, file))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        file: tokio::fs::File,
    ) -> Result<u64, AuditError> {
        let size = file.metadata().await?.len();
        let url = self.url(Api::Worker, &object_path(key));
        let resp = self
            .request(Api::Worker, reqwest::Method::PUT, &url)
            .query(&[("bucket", bucket)])
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        expect_success(&url, resp).await?;
        debug!(size, "uploaded object");
        Ok(size)
    }

    #[instrument(name = "renterd_get_object", skip(self, sink))]
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AuditError> {
        let url = self.url(Api::Worker, &object_path(key));
        let resp = self
            .request(Api::Worker, reqwest::Method::GET, &url)
            .query(&[("bucket", bucket)])
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        let mut resp = expect_success(&url, resp).await?;
        let mut written = 0_u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| transport_error(&url, &e))?
        {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        debug!(written, "downloaded object");
        Ok(written)
    }

    #[instrument(name = "renterd_delete_object", skip(self))]
    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        recursive: bool,
    ) -> Result<(), AuditError> {
        let url = self.url(Api::Bus, &object_path(key));
        let mut query = vec![("bucket", bucket)];
        if recursive {
            query.push(("batch", "true"));
        }
        let resp = self
            .request(Api::Bus, reqwest::Method::DELETE, &url)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        expect_success(&url, resp).await?;
        Ok(())
    }

    #[instrument(name = "renterd_list_objects", skip(self))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectEntry>, AuditError> {
        let url = self.url(
            Api::Bus,
            &format!("objects/{}/", prefix.trim_matches('/')),
        );
        let mut entries = Vec::new();
        let mut marker = String::new();
        loop {
            let mut query = vec![
                ("bucket", bucket.to_string()),
                ("limit", LIST_PAGE_LIMIT.to_string()),
            ];
            if !marker.is_empty() {
                query.push(("marker", marker.clone()));
            }
            let page: ObjectsPage = self.get_json(ApiTag(Api::Bus), &url, &query).await?;
            let Some(last) = page.objects.last() else {
                break;
            };
            marker = last.key.clone();
            entries.extend(
                page.objects
                    .into_iter()
                    .filter(|e| !e.key.ends_with('/'))
                    .map(|e| ObjectEntry::new(e.key.trim_start_matches('/'), e.size)),
            );
            if !page.has_more {
                break;
            }
        }
        debug!(count = entries.len(), "listed objects");
        Ok(entries)
    }

    #[instrument(name = "renterd_redundancy_settings", skip(self))]
    async fn redundancy_settings(&self) -> Result<RedundancySettings, AuditError> {
        let url = self.url(Api::Bus, "settings/upload");
        let settings: UploadSettings = self.get_json(ApiTag(Api::Bus), &url, &[]).await?;
        if settings.redundancy.min_shards == 0 {
            warn!(redundancy = ?settings.redundancy, "store reported zero min shards");
        }
        Ok(settings.redundancy)
    }

    #[instrument(name = "renterd_prunable_space", skip(self))]
    async fn prunable_space(&self) -> Result<Vec<PrunableContract>, AuditError> {
        let url = self.url(Api::Bus, "contracts/prunable");
        let resp: PrunableResponse = self.get_json(ApiTag(Api::Bus), &url, &[]).await?;
        Ok(resp.contracts)
    }

    #[instrument(name = "renterd_reclaim", skip(self))]
    async fn reclaim(
        &self,
        contract_id: &str,
        budget: Duration,
    ) -> Result<ReclaimOutcome, AuditError> {
        let url = self.url(Api::Worker, &format!("rhp/contract/{contract_id}/prune"));
        let body = PruneRequest {
            timeout: u64::try_from(budget.as_nanos()).unwrap_or(u64::MAX),
        };
        let resp = self
            .request(Api::Worker, reqwest::Method::POST, &url)
            .timeout(budget)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        let resp = expect_success(&url, resp).await?;
        let pruned: PruneResponse = resp.json().await.map_err(|e| {
            AuditError::new(
                ErrorCode::Store,
                format!("failed to decode response from {url}: {e}"),
            )
        })?;
        if let Some(err) = pruned.error.filter(|e| !e.is_empty()) {
            return Err(AuditError::new(
                ErrorCode::Store,
                format!("failed to prune contract {contract_id}: {err}"),
            ));
        }
        Ok(ReclaimOutcome {
            reclaimed: pruned.pruned,
            remaining: pruned.remaining,
        })
    }
}

#[async_trait]
impl AlertSink for RenterdBackend {
    #[instrument(name = "renterd_register_alert", skip(self, alert), fields(id = %alert.id))]
    async fn publish(&self, alert: &Alert) -> Result<(), AuditError> {
        let url = self.url(Api::Bus, "alerts/register");
        let resp = self
            .request(Api::Bus, reqwest::Method::POST, &url)
            .json(alert)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        expect_success(&url, resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RenterdBackend {
        RenterdBackend::new(RenterdEndpoints {
            bus: "http://localhost:9880/api/bus/".to_string(),
            bus_password: "test".to_string(),
            worker: "http://localhost:9880/api/worker".to_string(),
            worker_password: "test".to_string(),
        })
        .expect("backend")
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let b = backend();
        assert_eq!(
            b.url(Api::Bus, &object_path("/data/ab.data")),
            "http://localhost:9880/api/bus/objects/data/ab.data"
        );
        assert_eq!(
            b.url(Api::Worker, "rhp/contract/fcid/prune"),
            "http://localhost:9880/api/worker/rhp/contract/fcid/prune"
        );
    }

    #[test]
    fn objects_page_accepts_entries_alias() {
        let page: ObjectsPage =
            serde_json::from_str(r#"{"hasMore":false,"entries":[{"name":"/data/a.data","size":3}]}"#)
                .expect("decode");
        assert!(!page.has_more);
        assert_eq!(page.objects[0].key, "/data/a.data");
    }
}
