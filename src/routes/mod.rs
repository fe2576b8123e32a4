//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//!
//! 각 하위 모듈:
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `interviews`: 면접 세션 생성과 조회
//! - `ws`: 면접 진행용 웹소켓 게이트웨이

pub mod health;
pub mod interviews;
pub mod ws;

pub use health::*;
pub use interviews::*;
pub use ws::*;

use sqlx::SqlitePool;

use crate::services::interview::SessionRegistry;

/// 모든 핸들러가 공유하는 애플리케이션 상태
///
/// `#[derive(Clone)]`이 필요한 이유: Axum은 요청마다 State를 복제해서 핸들러에 넘깁니다.
/// 필드들은 모두 내부적으로 Arc를 쓰므로 복제 비용이 작습니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀
    pub pool: SqlitePool,
    /// JWT 토큰 검증용 비밀키
    pub jwt_secret: String,
    /// 세션별 액터 레지스트리 (상태 머신 진입점)
    pub registry: SessionRegistry,
}
