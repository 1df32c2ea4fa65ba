//! HTTP handler functions for the roadwatch API.

use actix_web::{HttpResponse, web};
use roadwatch_issue_models::{IssueQuery, IssueStatus, IssueType};
use roadwatch_pipeline::PipelineError;
use roadwatch_pipeline::detection::{AnalysisOutcome, BatchItem, BatchItemResult};
use roadwatch_pipeline::health::compute_stats;
use roadwatch_pipeline::progress::NullProgress;
use roadwatch_pipeline::{list_issues as query_issues, status};
use roadwatch_server_models::{
    AnalyzeRequest, AnalyzeResponse, ApiBatchItemResult, ApiError, ApiHealth, BatchRequest,
    BatchResponse, HealthStatsResponse, IssueListParams, IssueListResponse, IssueResponse,
    StatusUpdateRequest,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// `POST /api/detect/analyze`
///
/// `201` when an issue was stored, `200` when the image showed nothing
/// actionable.
pub async fn analyze(state: web::Data<AppState>, body: web::Json<AnalyzeRequest>) -> HttpResponse {
    let req = body.into_inner();

    match state
        .pipeline
        .analyze_one(req.image.as_deref(), req.lat, req.lng)
        .await
    {
        Ok(AnalysisOutcome {
            detection,
            issue: Some(issue),
        }) => HttpResponse::Created().json(AnalyzeResponse {
            success: true,
            message: "Issue detected and saved".to_string(),
            detection,
            issue: Some(issue),
        }),
        Ok(AnalysisOutcome {
            detection,
            issue: None,
        }) => HttpResponse::Ok().json(AnalyzeResponse {
            success: true,
            message: "No infrastructure issues detected".to_string(),
            detection,
            issue: None,
        }),
        Err(e) => error_response("analyze image", &e),
    }
}

/// `POST /api/detect/batch`
///
/// Per-item failures are reported inside a `200`; only a malformed batch
/// as a whole is rejected.
pub async fn batch(state: web::Data<AppState>, body: web::Json<BatchRequest>) -> HttpResponse {
    let items: Vec<BatchItem> = body
        .into_inner()
        .images
        .into_iter()
        .map(|req| BatchItem {
            image: req.image,
            lat: req.lat,
            lng: req.lng,
        })
        .collect();

    match state.pipeline.analyze_batch(&items, &NullProgress).await {
        Ok(outcome) => {
            let message = outcome.summary();
            let results = outcome.results.into_iter().map(to_api_result).collect();
            HttpResponse::Ok().json(BatchResponse {
                success: true,
                message,
                results,
            })
        }
        Err(e) => error_response("process batch", &e),
    }
}

/// `GET /api/issues`
pub async fn list_issues(
    state: web::Data<AppState>,
    params: web::Query<IssueListParams>,
) -> HttpResponse {
    let status = match params.status.as_deref().map(str::parse::<IssueStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        Some(Err(_)) => {
            return bad_request(format!(
                "status must be one of: {}",
                join_names(IssueStatus::all())
            ));
        }
    };

    let issue_type = match params.issue_type.as_deref().map(str::parse::<IssueType>) {
        None => None,
        Some(Ok(issue_type)) => Some(issue_type),
        Some(Err(_)) => {
            return bad_request(format!(
                "issue_type must be one of: {}",
                join_names(IssueType::all())
            ));
        }
    };

    let query = IssueQuery {
        status,
        issue_type,
        limit: params.limit,
    };

    match query_issues(state.pipeline.store().as_ref(), &query).await {
        Ok(issues) => HttpResponse::Ok().json(IssueListResponse {
            success: true,
            count: issues.len(),
            issues,
        }),
        Err(e) => error_response("retrieve issues", &e),
    }
}

/// `PATCH /api/issues/{id}/status`
pub async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let new_status = body.status.as_deref().unwrap_or_default();

    match status::set_status(state.pipeline.store().as_ref(), &id, new_status).await {
        Ok(issue) => HttpResponse::Ok().json(IssueResponse {
            success: true,
            message: "Issue status updated".to_string(),
            issue,
        }),
        Err(e) => error_response("update issue status", &e),
    }
}

/// `GET /api/issues/stats/health`
pub async fn health_stats(state: web::Data<AppState>) -> HttpResponse {
    match compute_stats(state.pipeline.store().as_ref()).await {
        Ok(stats) => HttpResponse::Ok().json(HealthStatsResponse {
            success: true,
            stats,
        }),
        Err(e) => error_response("retrieve health stats", &e),
    }
}

fn to_api_result(result: BatchItemResult) -> ApiBatchItemResult {
    let index = result.index;

    match result.outcome {
        Ok(AnalysisOutcome { detection, issue }) => ApiBatchItemResult {
            index,
            success: true,
            detection: Some(detection),
            message: issue.is_none().then(|| "No issue detected".to_string()),
            issue,
            error: None,
        },
        Err(e) => ApiBatchItemResult {
            index,
            success: false,
            detection: None,
            issue: None,
            error: Some(e.to_string()),
            message: None,
        },
    }
}

/// Maps a pipeline failure to its HTTP status.
fn error_response(action: &str, err: &PipelineError) -> HttpResponse {
    match err {
        PipelineError::Validation { message } => bad_request(message.clone()),
        PipelineError::NotFound { .. } => {
            HttpResponse::NotFound().json(ApiError::new(err.to_string()))
        }
        PipelineError::Classification(_) => {
            log::error!("Failed to {action}: {err}");
            HttpResponse::BadGateway().json(ApiError::new(err.to_string()))
        }
        PipelineError::Persistence(_) => {
            log::error!("Failed to {action}: {err}");
            HttpResponse::InternalServerError().json(ApiError::new(format!("Failed to {action}")))
        }
    }
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError::new(message))
}

fn join_names<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use roadwatch_image::DecodedImage;
    use roadwatch_issue_models::{DetectedKind, DetectionResult, Issue};
    use roadwatch_pipeline::config::PipelineConfig;
    use roadwatch_pipeline::detection::DetectionPipeline;
    use roadwatch_store::memory::MemoryIssueStore;
    use roadwatch_vision::VisionError;
    use roadwatch_vision::providers::Classifier;
    use serde_json::{Value, json};

    use crate::{AppState, configure, json_config};

    const IMAGE: &str = "data:image/jpeg;base64,aGVsbG8=";

    /// Returns the same reply for every image.
    struct FixedClassifier(Option<DetectionResult>);

    #[async_trait::async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _image: &DecodedImage) -> Result<DetectionResult, VisionError> {
            self.0.clone().ok_or_else(|| VisionError::Provider {
                message: "model overloaded".to_string(),
            })
        }
    }

    fn pothole() -> DetectionResult {
        DetectionResult {
            issue_type: DetectedKind::Pothole,
            severity: 8,
            description: "Large pothole".to_string(),
            confidence_score: 0.92,
        }
    }

    fn state(reply: Option<DetectionResult>) -> actix_web::web::Data<AppState> {
        let config = PipelineConfig {
            inter_item_delay: Duration::ZERO,
            ..PipelineConfig::default()
        };
        actix_web::web::Data::new(AppState {
            pipeline: Arc::new(DetectionPipeline::new(
                Arc::new(FixedClassifier(reply)),
                Arc::new(MemoryIssueStore::new()),
                config,
            )),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .app_data(json_config())
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = app!(state(None));

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    #[actix_web::test]
    async fn analyze_stores_qualifying_issue() {
        let data = state(Some(pothole()));
        let app = app!(data);

        let req = test::TestRequest::post()
            .uri("/api/detect/analyze")
            .set_json(json!({"image": IMAGE, "lat": 22.7196, "lng": 75.8577}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["issue"]["issue_type"], "pothole");
        assert_eq!(body["issue"]["status"], "Open");
        assert_eq!(body["detection"]["severity"], 8);

        let req = test::TestRequest::get().uri("/api/issues").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
    }

    #[actix_web::test]
    async fn analyze_without_issue_returns_ok() {
        let app = app!(state(Some(DetectionResult::no_issue())));

        let req = test::TestRequest::post()
            .uri("/api/detect/analyze")
            .set_json(json!({"image": IMAGE, "lat": 1.0, "lng": 2.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detection"]["issue_type"], "none");
        assert!(body.get("issue").is_none());
    }

    #[actix_web::test]
    async fn analyze_maps_errors_to_statuses() {
        let app = app!(state(None));

        let req = test::TestRequest::post()
            .uri("/api/detect/analyze")
            .set_json(json!({"lat": 1.0, "lng": 2.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Image is required");

        let req = test::TestRequest::post()
            .uri("/api/detect/analyze")
            .set_json(json!({"image": IMAGE, "lat": 1.0, "lng": 2.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn malformed_json_is_bad_request() {
        let app = app!(state(None));

        let req = test::TestRequest::post()
            .uri("/api/detect/analyze")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn batch_reports_each_item() {
        let app = app!(state(Some(pothole())));

        let req = test::TestRequest::post()
            .uri("/api/detect/batch")
            .set_json(json!({"images": [
                {"image": IMAGE, "lat": 1.0, "lng": 2.0},
                {"image": IMAGE, "lat": 1.0},
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Processed 1/2 images, detected 1 issues");
        assert_eq!(body["results"][0]["index"], 0);
        assert_eq!(body["results"][0]["success"], true);
        assert!(body["results"][0]["issue"].is_object());
        assert_eq!(body["results"][1]["index"], 1);
        assert_eq!(body["results"][1]["success"], false);
        assert!(body["results"][1]["error"].is_string());
    }

    #[actix_web::test]
    async fn batch_isolates_wrongly_typed_entries() {
        let app = app!(state(Some(pothole())));

        let req = test::TestRequest::post()
            .uri("/api/detect/batch")
            .set_json(json!({"images": [
                {"image": IMAGE, "lat": "22.7196", "lng": "75.8577"},
                {"image": 123, "lat": 1.0, "lng": 2.0},
                {"image": IMAGE, "lat": 1.0, "lng": 2.0},
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Processed 2/3 images, detected 2 issues");
        assert_eq!(body["results"][0]["success"], true);
        assert_eq!(body["results"][0]["issue"]["lat"], 22.7196);
        assert_eq!(body["results"][1]["index"], 1);
        assert_eq!(body["results"][1]["success"], false);
        assert_eq!(body["results"][1]["error"], "Image is required");
        assert_eq!(body["results"][2]["success"], true);
    }

    #[actix_web::test]
    async fn batch_rejects_empty_and_oversized() {
        let app = app!(state(Some(pothole())));

        let req = test::TestRequest::post()
            .uri("/api/detect/batch")
            .set_json(json!({"images": []}))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let images: Vec<Value> = (0..11)
            .map(|_| json!({"image": IMAGE, "lat": 1.0, "lng": 2.0}))
            .collect();
        let req = test::TestRequest::post()
            .uri("/api/detect/batch")
            .set_json(json!({ "images": images }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Maximum 10 images allowed per batch");
    }

    #[actix_web::test]
    async fn status_update_and_health_stats() {
        let data = state(Some(pothole()));
        let app = app!(data);

        let issue: Issue = data
            .pipeline
            .analyze_one(Some(IMAGE), Some(1.0), Some(2.0))
            .await
            .unwrap()
            .issue
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/api/issues/stats/health")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stats"]["totalIssues"], 1);
        assert_eq!(body["stats"]["potholeCount"], 1);
        assert_eq!(body["stats"]["grade"], "F");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/issues/{}/status", issue.id))
            .set_json(json!({"status": "Cancelled"}))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::patch()
            .uri("/api/issues/nope/status")
            .set_json(json!({"status": "Resolved"}))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        let req = test::TestRequest::patch()
            .uri(&format!("/api/issues/{}/status", issue.id))
            .set_json(json!({"status": "Resolved"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["issue"]["status"], "Resolved");

        let req = test::TestRequest::get()
            .uri("/api/issues?status=Open")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 0);

        let req = test::TestRequest::get()
            .uri("/api/issues/stats/health")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stats"]["totalIssues"], 0);
        assert_eq!(body["stats"]["grade"], "A");
    }

    #[actix_web::test]
    async fn list_rejects_unknown_filters() {
        let app = app!(state(None));

        let req = test::TestRequest::get()
            .uri("/api/issues?issue_type=graffiti")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
