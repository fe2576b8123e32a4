//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 필수 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로
//! - `JWT_SECRET`: 액세스 토큰 검증에 사용할 비밀키
//! - `AI_SERVER_URL`: 질문 생성/답변 평가를 담당하는 AI 서버 주소
//!
//! 선택 항목 (기본값 있음):
//! - `HOST`, `PORT`: 서버 바인딩 주소
//! - `UPLOADS_PATH`: 업로드된 PDF 저장 디렉토리
//! - `PUBLIC_FILES_URL`: 저장된 파일을 가리키는 URL 접두사
//! - `AI_TIMEOUT_SECS`: AI 서버 호출 제한 시간
//! - `MAX_FOLLOWUPS`: 메인 질문 하나당 꼬리 질문 최대 개수
//! - `SESSION_IDLE_SECS`: 유휴 세션 액터가 종료되기까지의 시간
//! - `TTS_API_KEY`, `OPENAI_API_KEY`: 음성 합성/음성 인식 토큰 발급 키

use std::env;
use std::str::FromStr;

/// 애플리케이션 전체 설정을 담는 구조체
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 파일 경로 (예: "sqlite:data/mockview.db")
    pub database_url: String,
    /// JWT 토큰 검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// AI 서버 베이스 URL (예: "http://localhost:8000")
    pub ai_server_url: String,
    /// AI 서버 호출 타임아웃(초). 멈춘 호출이 세션을 영원히 PENDING에 두지 않도록 합니다.
    pub ai_timeout_secs: u64,
    /// 업로드 파일이 저장되는 디렉토리 경로
    pub uploads_path: String,
    /// 저장된 파일 URL의 접두사
    pub public_files_url: String,
    /// 메인 질문 하나당 꼬리 질문 최대 개수
    pub max_followups: i64,
    /// 세션 액터 유휴 종료 시간(초)
    pub session_idle_secs: u64,
    /// Google Cloud TTS API 키: 없으면 음성 없이 질문을 전달합니다
    pub tts_api_key: Option<String>,
    /// OpenAI API 키: 없으면 STT 토큰 없이 질문을 전달합니다
    pub openai_api_key: Option<String>,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`, `JWT_SECRET`, `AI_SERVER_URL`은 필수이며, 없으면 에러가 발생합니다.
    /// 숫자 항목은 파싱에 실패하면 기본값을 사용합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            ai_server_url: env::var("AI_SERVER_URL")?,
            ai_timeout_secs: parse_or("AI_TIMEOUT_SECS", 60),
            uploads_path: env::var("UPLOADS_PATH")
                .unwrap_or_else(|_| "data/uploads".to_string()),
            public_files_url: env::var("PUBLIC_FILES_URL")
                .unwrap_or_else(|_| "/files".to_string()),
            max_followups: parse_or("MAX_FOLLOWUPS", 3),
            session_idle_secs: parse_or("SESSION_IDLE_SECS", 600),
            // 빈 문자열은 "설정 안 함"으로 취급합니다
            tts_api_key: env::var("TTS_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000),
        })
    }
}

/// 환경변수를 숫자로 파싱하고, 없거나 잘못된 값이면 기본값을 반환합니다.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
