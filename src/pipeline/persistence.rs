//! Persistence sink: fire-and-forget storage of successful scans.
//!
//! Failures are returned as values and, on the scan path, only logged. A
//! failed insert never reaches the user and is never retried.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::SupabaseConfig;
use crate::models::{MedicineRecord, ScanRow};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("persistence not configured")]
    NotConfigured,

    #[error("Persistence backend unreachable: {0}")]
    Unreachable(String),

    #[error("Persistence backend rejected request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to decode stored rows: {0}")]
    Decode(String),
}

pub type PersistResult = Result<(), PersistenceError>;

/// Remote table of scanned medicines.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Insert one row. Exactly one attempt.
    async fn insert(&self, row: &ScanRow) -> PersistResult;

    /// Most recent rows first.
    async fn recent(&self, limit: usize) -> Result<Vec<ScanRow>, PersistenceError>;
}

// ──────────────────────────────────────────────
// Supabase (PostgREST)
// ──────────────────────────────────────────────

pub struct SupabaseSink {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    table: String,
}

impl SupabaseSink {
    pub fn new(client: reqwest::Client, url: &str, anon_key: &str, table: &str) -> Self {
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            table: table.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }
}

fn unreachable(e: reqwest::Error) -> PersistenceError {
    if e.is_connect() {
        PersistenceError::Unreachable("connection refused or host unreachable".into())
    } else if e.is_timeout() {
        PersistenceError::Unreachable("request timed out".into())
    } else {
        PersistenceError::Unreachable(e.without_url().to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PersistenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PersistenceError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PersistenceSink for SupabaseSink {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn insert(&self, row: &ScanRow) -> PersistResult {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(std::slice::from_ref(row))
            .send()
            .await
            .map_err(unreachable)?;
        check_status(response).await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScanRow>, PersistenceError> {
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*"),
                ("order", "scanned_at.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(unreachable)?;
        let response = check_status(response).await?;
        let body = response.text().await.map_err(unreachable)?;
        serde_json::from_str(&body).map_err(|e| PersistenceError::Decode(e.to_string()))
    }
}

// ──────────────────────────────────────────────
// Disabled
// ──────────────────────────────────────────────

/// Stand-in when no persistence backend is configured.
pub struct DisabledSink;

#[async_trait]
impl PersistenceSink for DisabledSink {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn insert(&self, _row: &ScanRow) -> PersistResult {
        tracing::debug!("Persistence disabled, dropping scan row");
        Err(PersistenceError::NotConfigured)
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<ScanRow>, PersistenceError> {
        Err(PersistenceError::NotConfigured)
    }
}

/// Supabase when both URL and key are set, otherwise the disabled sink.
pub fn build_sink(config: &SupabaseConfig, client: reqwest::Client) -> Arc<dyn PersistenceSink> {
    match (&config.url, &config.anon_key) {
        (Some(url), Some(key)) => {
            tracing::info!(table = %config.table, "Supabase persistence enabled");
            Arc::new(SupabaseSink::new(client, url, key, &config.table))
        }
        _ => {
            tracing::warn!("Supabase credentials are missing, scans will not be saved");
            Arc::new(DisabledSink)
        }
    }
}

/// Store a record on a detached task. The handle is returned for tests and
/// shutdown; the scan path never awaits it.
pub fn spawn_persist(sink: Arc<dyn PersistenceSink>, record: MedicineRecord) -> JoinHandle<()> {
    let span = tracing::info_span!("persist", sink = sink.name(), medicine = %record.name);
    tokio::spawn(
        async move {
            let row = ScanRow::stamped(record);
            match sink.insert(&row).await {
                Ok(()) => tracing::info!("Scan saved"),
                Err(e) => tracing::warn!(error = %e, "Failed to save scan"),
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::transport::http_client;
    use crate::pipeline::testing::{sample_record, spawn_stub, unused_local_url, RecordingSink};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::time::Duration;

    fn sink(base_url: &str) -> SupabaseSink {
        SupabaseSink::new(
            http_client(Duration::from_secs(5)).unwrap(),
            base_url,
            "anon-key",
            "medicines",
        )
    }

    #[tokio::test]
    async fn insert_posts_row_with_headers() {
        let stub = spawn_stub(StatusCode::CREATED, "").await;
        let row = ScanRow::stamped(sample_record());

        sink(stub.base_url()).insert(&row).await.unwrap();

        let request = stub.last_request();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.uri.path(), "/rest/v1/medicines");
        assert_eq!(request.headers["apikey"], "anon-key");
        assert_eq!(request.headers["authorization"], "Bearer anon-key");
        assert_eq!(request.headers["prefer"], "return=minimal");

        let body = request.json();
        assert_eq!(body[0]["name"], "Ibuprofen 200mg");
        assert_eq!(body[0]["ingredients"][1], "Corn starch");
        assert!(body[0]["scanned_at"].is_string());
    }

    #[tokio::test]
    async fn rejected_insert_is_a_value() {
        let stub = spawn_stub(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid API key"}"#).await;
        let result = sink(stub.base_url())
            .insert(&ScanRow::stamped(sample_record()))
            .await;
        assert!(matches!(result, Err(PersistenceError::Rejected { status: 401, .. })));
    }

    #[tokio::test]
    async fn unreachable_insert_is_a_value() {
        let url = unused_local_url().await;
        let result = sink(&url).insert(&ScanRow::stamped(sample_record())).await;
        assert!(matches!(result, Err(PersistenceError::Unreachable(_))));
    }

    #[tokio::test]
    async fn recent_orders_newest_first() {
        let rows = json!([{
            "id": 7,
            "name": "Ibuprofen 200mg",
            "description": "Pain reliever",
            "ingredients": ["Ibuprofen"],
            "price": "$6.99",
            "availability": "OTC",
            "precautions": ["Take with food"],
            "alternatives": null,
            "scanned_at": "2026-03-01T10:00:00Z"
        }]);
        let stub = spawn_stub(StatusCode::OK, rows.to_string()).await;

        let recent = sink(stub.base_url()).recent(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].record.alternatives, None);

        let query = stub.last_request().uri.query().unwrap().to_string();
        assert!(query.contains("order=scanned_at.desc"));
        assert!(query.contains("limit=5"));
    }

    #[tokio::test]
    async fn recent_with_bad_body_is_decode_error() {
        let stub = spawn_stub(StatusCode::OK, r#"{"not": "a list"}"#).await;
        let result = sink(stub.base_url()).recent(5).await;
        assert!(matches!(result, Err(PersistenceError::Decode(_))));
    }

    #[tokio::test]
    async fn disabled_sink_reports_not_configured() {
        let result = DisabledSink.insert(&ScanRow::stamped(sample_record())).await;
        assert_eq!(result, Err(PersistenceError::NotConfigured));
        assert_eq!(result.unwrap_err().to_string(), "persistence not configured");
    }

    #[test]
    fn build_sink_requires_both_credentials() {
        let client = http_client(Duration::from_secs(5)).unwrap();
        let mut config = SupabaseConfig {
            url: Some("https://x.supabase.co".into()),
            anon_key: None,
            table: "medicines".into(),
        };
        assert_eq!(build_sink(&config, client.clone()).name(), "disabled");

        config.anon_key = Some("key".into());
        assert_eq!(build_sink(&config, client).name(), "supabase");
    }

    #[tokio::test]
    async fn spawned_persist_stores_row() {
        let sink = Arc::new(RecordingSink::default());
        spawn_persist(sink.clone(), sample_record()).await.unwrap();
        assert_eq!(sink.rows()[0].record, sample_record());
    }

    #[tokio::test]
    async fn spawned_persist_swallows_failure() {
        let sink = Arc::new(RecordingSink::failing());
        let handle = spawn_persist(sink.clone(), sample_record());
        assert!(handle.await.is_ok());
        assert!(sink.rows().is_empty());
    }
}
