//! # 면접 세션 모델 정의
//!
//! 한 번의 면접 시도를 나타내는 세션 엔티티와 상태 열거형입니다.
//!
//! ## 상태 흐름
//! ```text
//! PENDING ──(질문 생성 완료)──▶ READY ──(client ready)──▶ IN_PROGRESS ──(마지막 메인 질문)──▶ COMPLETED
//!    │
//!    └──(준비 실패)──▶ FAILED
//! ```

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 세션의 상태: DB에는 `"IN_PROGRESS"` 같은 대문자 문자열로 저장됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// 세션 행은 있지만 질문 생성이 끝나지 않음
    Pending,
    /// 메인 질문이 모두 생성/저장됨
    Ready,
    /// 클라이언트가 준비 신호를 보내 첫 질문이 전달됨
    InProgress,
    /// 모든 메인 질문에 답변함 (종료 상태)
    Completed,
    /// 준비 과정이 복구 불가능하게 실패함 (종료 상태)
    Failed,
}

/// 면접 세션 엔티티: DB의 `interview_sessions` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    /// 세션 고유 식별자 (외부에서 지정 가능)
    pub id: String,
    /// 세션을 만든 사용자 ID: 방 입장 권한 확인에 사용
    pub user_id: String,
    pub title: String,
    pub company: String,
    pub job_title: String,
    pub job_spec: String,
    /// 회사의 인재상
    pub ideal_talent: Option<String>,
    /// 업로드된 자기소개서 위치: 백그라운드 작업에서 채워짐
    pub cover_letter: Option<String>,
    /// 업로드된 포트폴리오 위치: 백그라운드 작업에서 채워짐
    pub portfolio: Option<String>,
    /// 현재 메인 질문 인덱스 (감소하지 않음)
    pub current_question_index: i64,
    pub status: SessionStatus,
    /// IN_PROGRESS로 전환된 시각: None이면 아직 시작 전
    pub started_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl InterviewSession {
    /// 면접 시작 후 경과한 시간(초)을 계산합니다.
    ///
    /// 아직 시작하지 않았거나 시각 파싱에 실패하면 0을 반환합니다.
    pub fn elapsed_sec(&self) -> i64 {
        self.started_at
            .as_deref()
            .and_then(|started| NaiveDateTime::parse_from_str(started, "%Y-%m-%dT%H:%M:%S%.3fZ").ok())
            .map(|started| (Utc::now() - started.and_utc()).num_seconds().max(0))
            .unwrap_or(0)
    }
}

/// 질문 생성에 필요한 면접 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewProfile {
    pub company: String,
    pub job_title: String,
    pub job_spec: String,
    pub ideal_talent: String,
}

/// 새 세션 생성에 필요한 값들
#[derive(Debug, Clone)]
pub struct NewInterviewSession<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
    pub profile: &'a InterviewProfile,
}

/// 업로드된 문서 하나 (자기소개서 또는 포트폴리오)
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    /// 사용자가 올린 원본 파일명
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// 백그라운드 준비 작업의 입력
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub profile: InterviewProfile,
    pub cover_letter: DocumentPayload,
    pub portfolio: DocumentPayload,
}

/// `POST /api/v1/interviews` 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInterviewResponse {
    pub session_id: String,
}
