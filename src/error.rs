//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 에러 타입을 정의합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError`: REST 핸들러와 DB 계층의 에러. `IntoResponse`로 HTTP 응답이 됩니다.
//! - `InterviewError`: 면접 상태 머신의 에러. 웹소켓 `error` 이벤트의
//!   안정적인 코드(`code()`)로 변환됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// REST 계층과 DB 계층에서 발생할 수 있는 에러
///
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from] 덕분에 sqlx 함수 뒤에 `?`만 붙이면 AppError::Database로 변환됩니다.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파일 입출력 오류 (HTTP 500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 인증 실패 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 다른 사용자의 리소스에 접근 (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// PDF가 아닌 파일 업로드 (HTTP 415)
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, IO, Internal)는 실제 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "An IO error occurred".to_string(),
                )
            }
            AppError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::UnsupportedMediaType(ref msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                msg.clone(),
            ),
        };

        // 결과: { "error": { "code": "not_found", "message": "Resource not found" } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// 면접 상태 머신과 소켓 게이트웨이에서 발생하는 에러
///
/// 크게 두 부류로 나뉩니다:
/// - **거절(rejection)**: 프로토콜 위반, 준비되지 않은 세션, 권한 없음.
///   상태를 전혀 바꾸지 않으며 요청한 소켓에만 알립니다.
/// - **처리 실패**: 외부 협력자(DB, AI 서버) 실패. 방(room) 전체에 알립니다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterviewError {
    #[error("Interview session not found: {0}")]
    SessionNotFound(String),

    #[error("You are not allowed to join session {0}")]
    AccessDenied(String),

    #[error("Join a session room before sending {0}")]
    RoomNotJoined(&'static str),

    #[error("Could not retrieve session details: {0}")]
    SessionFetchFailed(String),

    #[error("Interview questions are not ready yet")]
    NotReady,

    #[error("Interview is not in progress")]
    NotInProgress,

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("An answer was already submitted for step {0}")]
    AlreadyAnswered(String),

    #[error("Step {0} is not the current question")]
    StepNotCurrent(String),

    #[error("Malformed message: {0}")]
    InvalidMessage(String),

    #[error("Failed to set up the interview: {0}")]
    SetupFailed(String),

    #[error("Failed to process interview questions: {0}")]
    QuestionProcessingFailed(String),

    #[error("Failed to process the answer: {0}")]
    AnswerProcessingFailed(String),
}

impl InterviewError {
    /// 클라이언트가 분기할 수 있는 안정적인 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            InterviewError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            InterviewError::AccessDenied(_) => "ROOM_ACCESS_DENIED",
            InterviewError::RoomNotJoined(_) => "ROOM_NOT_JOINED",
            InterviewError::SessionFetchFailed(_) => "SESSION_FETCH_FAILED",
            InterviewError::NotReady => "INTERVIEW_NOT_READY",
            InterviewError::NotInProgress => "SESSION_NOT_IN_PROGRESS",
            InterviewError::StepNotFound(_) => "STEP_NOT_FOUND",
            InterviewError::AlreadyAnswered(_) => "ANSWER_ALREADY_SUBMITTED",
            InterviewError::StepNotCurrent(_) => "STEP_NOT_CURRENT",
            InterviewError::InvalidMessage(_) => "INVALID_MESSAGE",
            InterviewError::SetupFailed(_) => "INTERVIEW_SETUP_FAILED",
            InterviewError::QuestionProcessingFailed(_) => "QUESTION_PROCESSING_FAILED",
            InterviewError::AnswerProcessingFailed(_) => "ANSWER_PROCESSING_FAILED",
        }
    }

    /// 클라이언트에게 보낼 메시지
    ///
    /// 처리 실패는 내부 원인을 숨기고 고정 문구만 보냅니다 (원인은 로그에 남김).
    pub fn client_message(&self) -> String {
        match self {
            InterviewError::SetupFailed(_) => {
                "Failed to set up the interview. Please try again.".to_string()
            }
            InterviewError::QuestionProcessingFailed(_) => {
                "Failed to process and save interview questions.".to_string()
            }
            InterviewError::AnswerProcessingFailed(_) => {
                "Failed to process your answer.".to_string()
            }
            InterviewError::SessionFetchFailed(_) => {
                "Could not retrieve session details.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// 요청한 소켓에만 알리는 거절인지 여부
    ///
    /// 처리 실패(`*_FAILED`)는 상태 머신이 이미 방 전체에 브로드캐스트했으므로
    /// 게이트웨이가 다시 보내지 않습니다.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            InterviewError::SetupFailed(_)
                | InterviewError::QuestionProcessingFailed(_)
                | InterviewError::AnswerProcessingFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_failures_are_not_rejections() {
        assert!(!InterviewError::AnswerProcessingFailed("timeout".into()).is_rejection());
        assert!(!InterviewError::SetupFailed("pdf".into()).is_rejection());
        assert!(InterviewError::AlreadyAnswered("s1".into()).is_rejection());
        assert!(InterviewError::AccessDenied("s1".into()).is_rejection());
    }

    #[test]
    fn client_message_hides_internal_cause() {
        let err = InterviewError::AnswerProcessingFailed("connection refused to 10.0.0.3".into());
        assert_eq!(err.code(), "ANSWER_PROCESSING_FAILED");
        assert!(!err.client_message().contains("10.0.0.3"));
    }
}
