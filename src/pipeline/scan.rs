//! One scan: analyze → normalize → persist (detached).

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use super::analysis::{build_analyzer, transport, MedicineAnalyzer};
use super::capture::ImagePayload;
use super::normalizer::{normalize, FailurePolicy, Resolution};
use super::persistence::{build_sink, spawn_persist, PersistenceSink};
use crate::config::ScanConfig;

/// Result of one pipeline run.
#[derive(Debug)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub resolution: Resolution,
    /// Detached persistence task, when one was started.
    pub persistence: Option<JoinHandle<()>>,
}

/// Strategy-agnostic scan pipeline shared by the CLI and the HTTP API.
#[derive(Clone)]
pub struct ScanPipeline {
    analyzer: Arc<dyn MedicineAnalyzer>,
    sink: Arc<dyn PersistenceSink>,
    failure_policy: FailurePolicy,
}

impl ScanPipeline {
    pub fn new(
        analyzer: Arc<dyn MedicineAnalyzer>,
        sink: Arc<dyn PersistenceSink>,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            analyzer,
            sink,
            failure_policy,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Result<Self, reqwest::Error> {
        let analyzer = build_analyzer(config)?;
        let sink = build_sink(&config.supabase, transport::http_client(config.http_timeout)?);
        Ok(Self::new(analyzer, sink, config.on_failure))
    }

    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        &self.sink
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Returns as soon as the resolution is known; persistence keeps running
    /// on its own task.
    pub async fn run(&self, image: &ImagePayload) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let start = std::time::Instant::now();

        let outcome = self.analyzer.analyze(image).await;
        let resolution = normalize(outcome, self.failure_policy);

        let persistence = match &resolution {
            Resolution::Display {
                record,
                persist: true,
            } => Some(spawn_persist(self.sink.clone(), record.clone())),
            _ => None,
        };

        match &resolution {
            Resolution::Display { record, persist } => tracing::info!(
                %scan_id,
                backend = self.analyzer.name(),
                medicine = %record.name,
                persist,
                elapsed_ms = %start.elapsed().as_millis(),
                "Scan resolved to record"
            ),
            Resolution::ShowError { kind, .. } => tracing::info!(
                %scan_id,
                backend = self.analyzer.name(),
                kind = kind.code(),
                elapsed_ms = %start.elapsed().as_millis(),
                "Scan resolved to error"
            ),
        }

        ScanReport {
            scan_id,
            resolution,
            persistence,
        }
    }
}
