//! API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`, CORS
//! for the browser frontend and a body limit sized for one encoded photo.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::types::{ApiContext, MAX_REQUEST_BYTES};

pub fn api_router(ctx: ApiContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/scan", post(endpoints::scan::scan))
        .route("/scans", get(endpoints::history::list))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    use crate::models::ScanRow;
    use crate::pipeline::analysis::demo;
    use crate::pipeline::analysis::{AnalysisOutcome, Provenance, RejectionReason};
    use crate::pipeline::persistence::DisabledSink;
    use crate::pipeline::testing::{sample_image, sample_record, success, MockAnalyzer, RecordingSink};
    use crate::pipeline::{FailurePolicy, PersistenceSink, ScanPipeline};

    fn app_with(outcome: AnalysisOutcome, sink: Arc<dyn PersistenceSink>) -> Router {
        let pipeline = ScanPipeline::new(
            Arc::new(MockAnalyzer::new(outcome)),
            sink,
            FailurePolicy::ShowError,
        );
        api_router(ApiContext::new(pipeline))
    }

    fn scan_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/scan")
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn data_url() -> String {
        format!("data:image/jpeg;base64,{}", sample_image().to_base64())
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_response_shape() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "mock");
        assert_eq!(json["persistence"], "disabled");
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_returns_record() {
        let sink = Arc::new(RecordingSink::default());
        let app = app_with(success(sample_record()), sink.clone());

        let body = serde_json::json!({ "image": data_url() }).to_string();
        let response = app.oneshot(scan_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["record"]["name"], "Ibuprofen 200mg");
        assert_eq!(json["demo"], false);
        assert!(json["scan_id"].is_string());
    }

    #[tokio::test]
    async fn demo_record_is_flagged() {
        let outcome = AnalysisOutcome::Success {
            record: demo::placeholder_record(),
            provenance: Provenance::Demo,
        };
        let app = app_with(outcome, Arc::new(RecordingSink::default()));

        let body = serde_json::json!({ "image": data_url() }).to_string();
        let json = response_json(app.oneshot(scan_request(body)).await.unwrap()).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["demo"], true);
    }

    #[tokio::test]
    async fn illegible_scan_is_a_normal_response() {
        let app = app_with(
            AnalysisOutcome::Rejected(RejectionReason::ImageIllegible),
            Arc::new(RecordingSink::default()),
        );

        let body = serde_json::json!({ "image": sample_image().to_base64() }).to_string();
        let response = app.oneshot(scan_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "image_illegible");
        assert!(json["message"].as_str().unwrap().contains("not clear enough"));
        assert!(json.get("record").is_none());
    }

    #[tokio::test]
    async fn invalid_base64_is_bad_request() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let body = serde_json::json!({ "image": "data:image/png;base64,***" }).to_string();
        let response = app.oneshot(scan_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn missing_image_field_is_bad_request() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let response = app.oneshot(scan_request("{}".into())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_lists_newest_first() {
        let sink = Arc::new(RecordingSink::default());
        let mut older = ScanRow::stamped(sample_record());
        older.scanned_at = Utc::now() - Duration::hours(1);
        older.record.name = "Older".into();
        sink.seed(older);
        sink.seed(ScanRow::stamped(sample_record()));

        let app = app_with(success(sample_record()), sink);
        let req = Request::get("/api/scans?limit=1").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["name"], "Ibuprofen 200mg");
    }

    #[tokio::test]
    async fn history_without_persistence_is_503() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let req = Request::get("/api/scans").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn zero_limit_is_bad_request() {
        let app = app_with(success(sample_record()), Arc::new(RecordingSink::default()));
        let req = Request::get("/api/scans?limit=0").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn not_found_for_unknown_route() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let req = Request::get("/api/nonexistent").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let app = app_with(success(sample_record()), Arc::new(DisabledSink));
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/scan")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
