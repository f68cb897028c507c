//! Inbound HTTP interface: `rank` over GET and POST.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use keywordscout_core::Pipeline;
use keywordscout_shared::{KeywordScoutError, ScoredAnnotation};

#[derive(Clone)]
pub(crate) struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankRequest {
    #[serde(default)]
    keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub(crate) fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rank", get(rank_query).post(rank_json))
        .with_state(AppState { pipeline })
}

/// Bind `addr` and serve until the process exits.
pub(crate) async fn serve(addr: &str, pipeline: Arc<Pipeline>) -> Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;

    info!(%addr, "rank server listening");
    axum::serve(listener, app).await.wrap_err("server shutdown")?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn rank_query(
    State(state): State<AppState>,
    request: std::result::Result<Query<RankRequest>, QueryRejection>,
) -> Result<Json<Vec<ScoredAnnotation>>, ApiError> {
    let Query(request) = request.map_err(|rejection| {
        warn!(error = %rejection, "unreadable rank query");
        bad_request("Invalid keyword")
    })?;
    rank(&state, request).await
}

async fn rank_json(
    State(state): State<AppState>,
    request: std::result::Result<Json<RankRequest>, JsonRejection>,
) -> Result<Json<Vec<ScoredAnnotation>>, ApiError> {
    let Json(request) = request.map_err(|rejection| {
        warn!(error = %rejection, "unreadable rank body");
        bad_request("Invalid keyword")
    })?;
    rank(&state, request).await
}

async fn rank(
    state: &AppState,
    request: RankRequest,
) -> Result<Json<Vec<ScoredAnnotation>>, ApiError> {
    let Some(keyword) = request.keyword else {
        return Err(bad_request("Invalid keyword"));
    };

    let start = Instant::now();
    match state.pipeline.rank(&keyword).await {
        Ok(ranked) => {
            info!(
                results = ranked.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "rank request served"
            );
            Ok(Json(ranked))
        }
        Err(e) => Err(api_error(e)),
    }
}

fn api_error(err: KeywordScoutError) -> ApiError {
    if err.is_validation() {
        warn!(error = %err, "rejected rank request");
        return bad_request(&err.to_string());
    }
    error!(error = %err, "rank request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use keywordscout_shared::AppConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(search_base_url: &str) -> Router {
        let mut config = AppConfig::default();
        config.http.search_base_url = search_base_url.to_string();
        config.retry.max_attempts = 1;
        config.limiter.min_time_ms = 0;
        router(Arc::new(Pipeline::from_config(&config).unwrap()))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = app("http://127.0.0.1:9")
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_keyword_is_bad_request() {
        let response = app("http://127.0.0.1:9")
            .oneshot(Request::get("/rank?keyword=%3Cb%3Ex").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid keyword"));
    }

    #[tokio::test]
    async fn missing_keyword_is_bad_request() {
        let response = app("http://127.0.0.1:9")
            .oneshot(
                Request::post("/rank")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_string_keyword_is_bad_request() {
        let response = app("http://127.0.0.1:9")
            .oneshot(
                Request::post("/rank")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"keyword": 5}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid keyword"}));
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_bad_request() {
        let response = app("http://127.0.0.1:9")
            .oneshot(
                Request::post("/rank")
                    .body(Body::from(json!({"keyword": "vegan dinner"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid keyword"}));
    }

    #[tokio::test]
    async fn upstream_outage_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let response = app(&server.uri())
            .oneshot(
                Request::post("/rank")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"keyword": "vegan dinner"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn empty_search_returns_empty_ranking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resource/BaseSearchResource/get/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resource_response": {"data": {"results": []}}
            })))
            .mount(&server)
            .await;

        let response = app(&server.uri())
            .oneshot(
                Request::get("/rank?keyword=vegan%20dinner")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }
}
