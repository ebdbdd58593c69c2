//! Shared state for the API router.

use std::sync::Arc;

use crate::pipeline::{PersistenceSink, ScanPipeline};

/// Largest accepted request body. Base64 inflates the image by 4/3.
pub const MAX_REQUEST_BYTES: usize = 24 * 1024 * 1024;

/// Default and maximum page size for `GET /api/scans`.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: ScanPipeline,
}

impl ApiContext {
    pub fn new(pipeline: ScanPipeline) -> Self {
        Self { pipeline }
    }

    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        self.pipeline.sink()
    }
}
