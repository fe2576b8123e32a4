//! # mockview 라이브러리
//!
//! 실시간 AI 모의면접 세션 오케스트레이터입니다.
//! 바이너리(`main.rs`)와 통합 테스트(`tests/`)가 같은 라우터와 서비스를 쓰도록
//! 모듈들을 라이브러리로 공개합니다.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use routes::AppState;

/// API 라우터를 만듭니다. 모든 경로는 `/api/v1` 아래에 있습니다.
///
/// | 메서드 | 경로 | 핸들러 |
/// |--------|------|--------|
/// | GET | /api/v1/health | `health_check` |
/// | POST | /api/v1/interviews | `create_interview` |
/// | GET | /api/v1/interviews/{id} | `get_interview` |
/// | GET | /api/v1/interviews/{id}/stt-token | `issue_stt_token` |
/// | GET | /api/v1/ws | `ws_handler` (웹소켓 업그레이드) |
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/interviews",
            // PDF 두 개가 들어가므로 기본 본문 제한(2MB)보다 크게 잡습니다
            post(routes::create_interview).layer(DefaultBodyLimit::max(routes::MAX_UPLOAD_BYTES)),
        )
        // axum 0.8부터 경로 파라미터는 {id} 문법입니다
        .route("/interviews/{id}", get(routes::get_interview))
        .route("/interviews/{id}/stt-token", get(routes::issue_stt_token))
        .route("/ws", get(routes::ws_handler))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
