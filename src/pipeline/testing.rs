//! Test doubles shared by the pipeline and API tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;

use crate::models::{MedicineRecord, ScanRow};
use crate::pipeline::analysis::{AnalysisOutcome, MedicineAnalyzer, Provenance};
use crate::pipeline::capture::ImagePayload;
use crate::pipeline::persistence::{PersistenceError, PersistenceSink};

pub(crate) fn sample_record() -> MedicineRecord {
    MedicineRecord {
        name: "Ibuprofen 200mg".into(),
        description: "Pain reliever and fever reducer".into(),
        ingredients: vec!["Ibuprofen 200mg".into(), "Corn starch".into()],
        price: "$6.99 - $9.49".into(),
        availability: "Over the counter".into(),
        precautions: vec!["Take with food".into(), "Do not exceed 6 tablets in 24 hours".into()],
        alternatives: Some(vec!["Acetaminophen 500mg".into()]),
    }
}

pub(crate) fn sample_image() -> ImagePayload {
    ImagePayload::new("image/jpeg", b"\xff\xd8\xff fake jpeg".to_vec()).unwrap()
}

pub(crate) fn success(record: MedicineRecord) -> AnalysisOutcome {
    AnalysisOutcome::Success {
        record,
        provenance: Provenance::Backend("mock"),
    }
}

// ──────────────────────────────────────────────
// Analyzer
// ──────────────────────────────────────────────

/// Returns a fixed outcome, optionally after a delay, and counts calls.
pub(crate) struct MockAnalyzer {
    outcome: AnalysisOutcome,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub(crate) fn new(outcome: AnalysisOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MedicineAnalyzer for MockAnalyzer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn analyze(&self, _image: &ImagePayload) -> AnalysisOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

// ──────────────────────────────────────────────
// Persistence sink
// ──────────────────────────────────────────────

/// Keeps inserted rows in memory; optionally fails every insert.
#[derive(Default)]
pub(crate) struct RecordingSink {
    rows: Mutex<Vec<ScanRow>>,
    fail: bool,
}

impl RecordingSink {
    pub(crate) fn failing() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn rows(&self) -> Vec<ScanRow> {
        self.rows.lock().unwrap().clone()
    }

    pub(crate) fn seed(&self, row: ScanRow) {
        self.rows.lock().unwrap().push(row);
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn insert(&self, row: &ScanRow) -> Result<(), PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Rejected {
                status: 500,
                body: "insert refused".into(),
            });
        }
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScanRow>, PersistenceError> {
        let mut rows = self.rows();
        rows.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

// ──────────────────────────────────────────────
// HTTP stub
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Local HTTP server answering every request with a fixed status and body.
pub(crate) struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("stub received no request")
    }
}

pub(crate) async fn spawn_stub(status: StatusCode, body: impl Into<String>) -> StubServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let body: String = body.into();

    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, request_body: String| {
            let recorded = recorded.clone();
            let body = body.clone();
            async move {
                recorded.lock().unwrap().push(RecordedRequest {
                    method,
                    uri,
                    headers,
                    body: request_body,
                });
                (status, body)
            }
        },
    );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    StubServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// Base URL of a local port with nothing listening on it.
pub(crate) async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
