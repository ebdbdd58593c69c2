//! HTTP API for the single-page frontend.
//!
//! Routes are nested under `/api/`:
//! - `GET /api/health`
//! - `POST /api/scan`
//! - `GET /api/scans`

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server_on, ApiServer};
pub use types::ApiContext;
