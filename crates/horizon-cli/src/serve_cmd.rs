use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use horizon_core::catalog::{self, Answers};
use horizon_core::entitlement::GenerateAction;
use horizon_core::generate::{GenerateError, Generator};
use horizon_core::service::{RoadmapService, ServiceError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
    /// Raw upstream text, kept when the generation backend returned an
    /// unusable payload.
    raw: Option<String>,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            raw: None,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
            raw: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
            raw: None,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::EntitlementDenied { .. } => StatusCode::FORBIDDEN,
            // A payload the backend produced but we cannot accept is the
            // upstream's fault; everything else is ours.
            ServiceError::Generate(GenerateError::Format { .. }) => StatusCode::BAD_GATEWAY,
            ServiceError::Generate(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let raw = match &err {
            ServiceError::Generate(GenerateError::Format { raw, .. }) => Some(raw.clone()),
            _ => None,
        };
        Self {
            status,
            message: format!("{err:#}"),
            raw,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = match self.raw {
            Some(raw) => serde_json::json!({ "error": self.message, "raw": raw }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Unconfigured backend
// ---------------------------------------------------------------------------

/// Placeholder backend used when no API key is configured.
///
/// Keeps the server bootable without credentials; every generation request
/// fails at call time with a configuration error, mirroring how a missing
/// key would surface.
pub struct UnconfiguredGenerator;

#[async_trait]
impl Generator for UnconfiguredGenerator {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    answers: Answers,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    /// Target answer set; defaults to the user's latest submission.
    answer_set_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct RoadmapQuery {
    answer_set_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    month: u8,
    task_index: u8,
    checked: bool,
}

#[derive(Debug, Serialize)]
struct GeneratedResponse {
    roadmap_id: Uuid,
    answer_set_id: Uuid,
    roadmap: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    service: RoadmapService,
}

pub fn build_router(pool: PgPool, generator: Arc<dyn Generator>) -> Router {
    let state = AppState {
        service: RoadmapService::new(pool, generator),
    };
    Router::new()
        .route("/", get(index))
        .route("/api/questions", get(list_questions))
        .route("/api/answers", post(submit_answers))
        .route("/api/result", get(interim_result))
        .route("/api/roadmap", get(get_roadmap).post(create_roadmap))
        .route("/api/roadmap/regenerate", post(regenerate_roadmap))
        .route("/api/roadmap/{id}/checks", put(put_check))
        .route("/api/roadmap/{id}/progress", get(get_progress))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(
    pool: PgPool,
    generator: Arc<dyn Generator>,
    bind: &str,
    port: u16,
) -> Result<()> {
    let app = build_router(pool, generator);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("horizon serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("horizon serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Resolve the caller from the `x-user-id` header.
///
/// The session layer is out of scope here; the header stands in for it, and
/// its absence is a hard precondition failure for every gated route.
fn require_user(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let value = headers
        .get("x-user-id")
        .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))?;
    let text = value
        .to_str()
        .map_err(|_| AppError::bad_request("x-user-id header is not valid text"))?;
    Uuid::parse_str(text)
        .map_err(|_| AppError::bad_request(format!("x-user-id is not a valid UUID: {text}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\
<html><head><title>horizon</title></head><body>\
<h1>horizon</h1>\
<p>Retirement readiness diagnosis and 12-month roadmap API.</p>\
<ul>\
<li>GET /api/questions</li>\
<li>POST /api/answers</li>\
<li>GET /api/result</li>\
<li>GET/POST /api/roadmap</li>\
<li>POST /api/roadmap/regenerate</li>\
<li>PUT /api/roadmap/{id}/checks</li>\
<li>GET /api/roadmap/{id}/progress</li>\
</ul>\
</body></html>",
    )
}

async fn list_questions() -> axum::response::Response {
    Json(catalog::QUESTIONS).into_response()
}

async fn submit_answers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;
    let answer_set = state.service.submit_answers(user_id, &req.answers).await?;
    Ok(Json(serde_json::json!({ "answer_set": answer_set })).into_response())
}

async fn interim_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoadmapQuery>,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;
    let report = state
        .service
        .interim_report(user_id, query.answer_set_id)
        .await?;
    Ok(Json(report).into_response())
}

async fn create_roadmap(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<axum::response::Response, AppError> {
    generate(state, headers, body, GenerateAction::Create).await
}

async fn regenerate_roadmap(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<axum::response::Response, AppError> {
    generate(state, headers, body, GenerateAction::Regenerate).await
}

async fn generate(
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
    action: GenerateAction,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;

    // The body is optional: an empty POST targets the latest answer set.
    let req: GenerateRequest = if body.is_empty() {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid request body: {e}")))?
    };

    let answer_set_id = match req.answer_set_id {
        Some(id) => id,
        None => state
            .service
            .latest_answer_set(user_id)
            .await?
            .ok_or_else(|| AppError::bad_request("no diagnosis has been submitted yet"))?
            .id,
    };

    let record = state.service.generate(user_id, answer_set_id, action).await?;

    Ok(Json(GeneratedResponse {
        roadmap_id: record.id,
        answer_set_id: record.answer_set_id,
        roadmap: record.roadmap,
    })
    .into_response())
}

async fn get_roadmap(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoadmapQuery>,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;

    let answer_set_id = match query.answer_set_id {
        Some(id) => id,
        None => state
            .service
            .latest_answer_set(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("no diagnosis has been submitted yet"))?
            .id,
    };

    let view = state
        .service
        .latest_roadmap(user_id, answer_set_id)
        .await?
        .ok_or_else(|| AppError::not_found("no roadmap has been generated yet"))?;

    Ok(Json(view).into_response())
}

async fn put_check(
    State(state): State<AppState>,
    Path(roadmap_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;

    state
        .service
        .set_task_checked(user_id, roadmap_id, req.month, req.task_index, req.checked)
        .await?;
    let progress = state.service.progress(user_id, roadmap_id).await?;

    Ok(Json(progress).into_response())
}

async fn get_progress(
    State(state): State<AppState>,
    Path(roadmap_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<axum::response::Response, AppError> {
    let user_id = require_user(&headers)?;
    let progress = state.service.progress(user_id, roadmap_id).await?;
    Ok(Json(progress).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use uuid::Uuid;

    use horizon_core::generate::{GenerateError, Generator};
    use horizon_test_utils::{create_test_db, drop_test_db};

    use super::UnconfiguredGenerator;

    /// Generator returning one fixed response.
    struct FixedGenerator(String);

    #[async_trait]
    impl Generator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.clone())
        }
    }

    fn roadmap_text(title: &str) -> String {
        serde_json::json!({
            "title": title,
            "summary": "요약",
            "top_priorities": ["연금 조회"],
            "months": (1..=12).map(|n| serde_json::json!({
                "month": n,
                "goal": "목표",
                "tasks": ["a", "b", "c"],
                "caution": "주의",
            })).collect::<Vec<_>>(),
        })
        .to_string()
    }

    fn router(pool: PgPool, generator: impl Generator + 'static) -> Router {
        super::build_router(pool, Arc::new(generator))
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<serde_json::Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample_answers_body() -> serde_json::Value {
        serde_json::json!({
            "answers": {
                "retire_year": "1~3년",
                "monthly_spend": "400 이상",
                "pension_ready": "모른다",
                "debt": "있음(부담 큼)",
                "priority": "지출 관리",
            }
        })
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_returns_html() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));

        let resp = send(&app, "GET", "/", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp
            .headers()
            .get("content-type")
            .expect("should have content-type header")
            .to_str()
            .unwrap();
        assert!(
            content_type.contains("text/html"),
            "content-type should contain text/html, got: {content_type}"
        );

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_questions_lists_the_catalog() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));

        let resp = send(&app, "GET", "/api/questions", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let arr = json.as_array().expect("response should be an array");
        assert_eq!(arr.len(), 10);
        assert_eq!(arr[0]["id"], "retire_year");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_missing_user_header_is_unauthorized() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));

        let resp = send(&app, "POST", "/api/answers", None, Some(sample_answers_body())).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_submit_then_interim_result() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));
        let user = Uuid::new_v4();

        let resp = send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["answer_set"]["id"].is_string());

        let resp = send(&app, "GET", "/api/result", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let priorities = json["top_priorities"].as_array().expect("array");
        assert_eq!(priorities.len(), 3);
        assert!(json["summary"].as_str().expect("string").contains("은퇴 시점"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_answers() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));
        let user = Uuid::new_v4();

        let body = serde_json::json!({ "answers": { "debt": "maybe" } });
        let resp = send(&app, "POST", "/api/answers", Some(user), Some(body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_roadmap_roundtrip() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("내 로드맵")));
        let user = Uuid::new_v4();

        send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;

        // Nothing generated yet.
        let resp = send(&app, "GET", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, "POST", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["roadmap"]["title"], "내 로드맵");
        assert_eq!(json["roadmap"]["months"].as_array().expect("array").len(), 12);

        let resp = send(&app, "GET", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["roadmap"]["title"], "내 로드맵");
        assert_eq!(json["progress"]["total"], 36);

        // Create is one-shot per answer set.
        let resp = send(&app, "POST", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "already generated");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_free_regenerate_is_forbidden() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));
        let user = Uuid::new_v4();

        send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;
        send(&app, "POST", "/api/roadmap", Some(user), None).await;

        let resp = send(&app, "POST", "/api/roadmap/regenerate", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "paid feature");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_non_json_backend_payload_is_bad_gateway() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator("not json".to_string()));
        let user = Uuid::new_v4();

        send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;

        let resp = send(&app, "POST", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert_eq!(json["raw"], "not json", "raw upstream text is retained");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_internal_error() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), UnconfiguredGenerator);
        let user = Uuid::new_v4();

        send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;

        let resp = send(&app, "POST", "/api/roadmap", Some(user), None).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(
            json["error"].as_str().expect("string").contains("OPENAI_API_KEY"),
            "error should name the missing configuration: {json}"
        );

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_checks_update_progress() {
        let (pool, db_name) = create_test_db().await;
        let app = router(pool.clone(), FixedGenerator(roadmap_text("t")));
        let user = Uuid::new_v4();

        send(&app, "POST", "/api/answers", Some(user), Some(sample_answers_body())).await;
        let resp = send(&app, "POST", "/api/roadmap", Some(user), None).await;
        let json = body_json(resp).await;
        let roadmap_id = json["roadmap_id"].as_str().expect("string").to_string();

        let check = serde_json::json!({ "month": 1, "task_index": 0, "checked": true });
        let resp = send(
            &app,
            "PUT",
            &format!("/api/roadmap/{roadmap_id}/checks"),
            Some(user),
            Some(check),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["done"], 1);
        assert_eq!(json["total"], 36);

        // Out-of-range month is rejected before touching the store.
        let bad = serde_json::json!({ "month": 13, "task_index": 0, "checked": true });
        let resp = send(
            &app,
            "PUT",
            &format!("/api/roadmap/{roadmap_id}/checks"),
            Some(user),
            Some(bad),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            &app,
            "GET",
            &format!("/api/roadmap/{roadmap_id}/progress"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["done"], 1);

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}
