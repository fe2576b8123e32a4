//! # mockview 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성과 마이그레이션
//! 4. 업로드 디렉토리 생성
//! 5. 외부 협력자(AI 서버, 음성, 저장소, 방 브로드캐스터)와 세션 레지스트리 조립
//! 6. HTTP/웹소켓 서버 시작
//!
//! 라우터와 서비스는 `lib.rs`(mockview 라이브러리)에 있고, 여기서는 조립만 합니다.

use anyhow::Result;
use mockview::{
    build_router,
    config::Config,
    db,
    routes::AppState,
    services::{
        ai_client::HttpAiGateway,
        interview::{InterviewEngine, SessionRegistry},
        rooms::InMemoryRooms,
        speech::HttpSpeechService,
        storage::LocalObjectStorage,
    },
};
use std::{path::Path, sync::Arc, time::Duration};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅 초기화 ──
    // RUST_LOG가 없으면 mockview, tower_http, axum을 debug 레벨로 출력합니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mockview=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;
    tracing::info!("Starting mockview server on {}:{}", config.host, config.port);

    // ── 4단계: DB 연결과 마이그레이션 ──
    let pool = db::connect(&config.database_url).await?;
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // ── 5단계: 업로드 디렉토리 생성 ──
    let uploads_path = Path::new(&config.uploads_path);
    if !uploads_path.exists() {
        tokio::fs::create_dir_all(uploads_path).await?;
        tracing::info!("Created uploads directory: {}", config.uploads_path);
    }

    // ── 6단계: 협력자 조립 ──
    // 트레이트 객체(Arc<dyn ...>)로 넘겨서 테스트에서는 가짜 구현으로 바꿀 수 있습니다.
    let ai = Arc::new(HttpAiGateway::new(&config.ai_server_url, config.ai_timeout_secs)?);
    let speech = Arc::new(HttpSpeechService::new(
        config.tts_api_key.clone(),
        config.openai_api_key.clone(),
        config.ai_timeout_secs,
    )?);
    if config.tts_api_key.is_none() || config.openai_api_key.is_none() {
        tracing::warn!("TTS or STT key missing, questions will be delivered without speech artifacts");
    }
    let storage = Arc::new(LocalObjectStorage::new(
        &config.uploads_path,
        &config.public_files_url,
    ));
    let rooms = Arc::new(InMemoryRooms::new());

    let engine = InterviewEngine::new(
        pool.clone(),
        ai,
        speech,
        storage,
        rooms,
        config.max_followups,
    );
    let registry = SessionRegistry::new(engine, Duration::from_secs(config.session_idle_secs));

    let state = AppState {
        pool,
        jwt_secret: config.jwt_secret.clone(),
        registry,
    };

    // ── 7단계: 라우터 ──
    // 업로드된 문서는 PUBLIC_FILES_URL 경로 아래로 서빙합니다.
    let mut app = build_router(state);
    if config.public_files_url.starts_with('/') {
        app = app.nest_service(&config.public_files_url, ServeDir::new(&config.uploads_path));
    }

    // ── 8단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
