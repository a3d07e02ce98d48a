//! HTTP client for the remote step store.
//!
//! Thin REST adapter implementing the `RemoteStepStore` port. One logical
//! row per user per day; `upsert` is idempotent on the server, so replaying
//! the latest record is always safe. No retry layer here: the throttler's
//! policy is log-and-drop, with the next accepted update naturally
//! re-attempting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use stridearc_core::RemoteStepStore;
use stridearc_domain::{RemoteStepFields, Result as DomainResult, SyncConfig};
use tracing::{debug, instrument};

use super::errors::SyncError;

/// Configuration for the remote store client.
#[derive(Debug, Clone)]
pub struct RemoteStoreClientConfig {
    /// Base URL for the step API (e.g. "https://api.stridearc.app/v1")
    pub base_url: String,
    /// Timeout for API requests
    pub timeout: Duration,
}

impl Default for RemoteStoreClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stridearc.app/v1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SyncConfig> for RemoteStoreClientConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }
}

/// REST client for the remote step store.
pub struct RemoteStoreClient {
    http: Client,
    config: RemoteStoreClientConfig,
}

impl RemoteStoreClient {
    /// Create a client with the given configuration.
    pub fn new(config: RemoteStoreClientConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    fn record_url(&self, user_id: &str, date: NaiveDate) -> String {
        format!(
            "{}/users/{}/steps/{}",
            self.config.base_url.trim_end_matches('/'),
            user_id,
            date
        )
    }

    async fn record_exists(&self, user_id: &str, date: NaiveDate) -> Result<bool, SyncError> {
        let url = self.record_url(user_id, date);
        debug!(%url, "Checking remote record existence");

        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(map_status(status, "exists check")),
        }
    }

    async fn put_record(
        &self,
        user_id: &str,
        date: NaiveDate,
        fields: &RemoteStepFields,
    ) -> Result<(), SyncError> {
        let url = self.record_url(user_id, date);
        debug!(%url, total_steps = fields.total_steps, "Upserting remote record");

        let response = self.http.put(&url).json(fields).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(map_status(status, "upsert"))
        }
    }
}

#[async_trait]
impl RemoteStepStore for RemoteStoreClient {
    #[instrument(skip(self))]
    async fn exists(&self, user_id: &str, date: NaiveDate) -> DomainResult<bool> {
        self.record_exists(user_id, date).await.map_err(Into::into)
    }

    #[instrument(skip(self, fields))]
    async fn upsert(
        &self,
        user_id: &str,
        date: NaiveDate,
        fields: &RemoteStepFields,
    ) -> DomainResult<()> {
        self.put_record(user_id, date, fields).await.map_err(Into::into)
    }
}

fn map_status(status: StatusCode, operation: &str) -> SyncError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            SyncError::RateLimit(format!("{operation} returned 429"))
        }
        status if status.is_server_error() => {
            SyncError::Server(format!("{operation} returned {status}"))
        }
        status => SyncError::Client(format!("{operation} returned {status}")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stridearc_domain::{Confidence, DailyStepRecord, StepSource, StrideArcError};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> RemoteStoreClient {
        RemoteStoreClient::new(RemoteStoreClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .expect("client builds")
    }

    fn fields(total: u32) -> RemoteStepFields {
        let record = DailyStepRecord {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            total_steps: total,
            target: 10_000,
            last_updated: Utc::now(),
            source: StepSource::Primary,
            confidence: Confidence::High,
        };
        RemoteStepFields::from(&record)
    }

    #[tokio::test]
    async fn upsert_puts_fields_to_the_day_resource() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/user-1/steps/2025-06-01"))
            .and(body_partial_json(serde_json::json!({ "total_steps": 512 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        client.upsert("user-1", date, &fields(512)).await.expect("upsert succeeds");
    }

    #[tokio::test]
    async fn exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/user-1/steps/2025-06-01"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let exists = client.exists("user-1", date).await.expect("exists succeeds");
        assert!(!exists);
    }

    #[tokio::test]
    async fn exists_maps_200_to_true() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/user-1/steps/2025-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_steps": 100
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(client.exists("user-1", date).await.expect("exists succeeds"));
    }

    #[tokio::test]
    async fn server_errors_surface_as_sync_failures() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/user-1/steps/2025-06-01"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let err = client.upsert("user-1", date, &fields(10)).await.expect_err("must fail");
        assert!(matches!(err, StrideArcError::Sync(_)));
    }
}
