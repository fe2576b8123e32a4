//! # 웹소켓 메시지 모델
//!
//! 모든 메시지는 `{ "type": "...", "payload": { ... } }` 형태의 JSON 텍스트 프레임입니다.
//!
//! | 방향 | type | payload |
//! |------|------|---------|
//! | 서버→클라이언트 | `questions-ready` | `sessionId`, `elapsedSec`, `answeredSteps`, `currentStep?` |
//! | 서버→클라이언트 | `next-question` | `step`, `isFollowUp`, `audioBase64`, `sttToken` |
//! | 서버→클라이언트 | `interview-finished` | `sessionId` |
//! | 서버→클라이언트 | `error` | `code`, `message` |
//! | 클라이언트→서버 | `join-room` | `sessionId` |
//! | 클라이언트→서버 | `ready` | `sessionId` |
//! | 클라이언트→서버 | `submit-answer` | `stepId`, `answer`, `duration` |

use serde::{Deserialize, Serialize};

use crate::error::InterviewError;
use crate::models::InterviewStep;

/// 서버가 방(room)이나 소켓 하나에 보내는 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    QuestionsReady(QuestionsReadyPayload),
    NextQuestion(NextQuestionPayload),
    InterviewFinished(InterviewFinishedPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(err: &InterviewError) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: err.code().to_string(),
            message: err.client_message(),
        })
    }

    pub fn finished(session_id: &str) -> Self {
        ServerEvent::InterviewFinished(InterviewFinishedPayload {
            session_id: session_id.to_string(),
        })
    }
}

/// 질문 준비 완료 알림 (재접속 시 스냅샷으로도 사용)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsReadyPayload {
    pub session_id: String,
    /// 면접 시작 후 경과 시간(초): 시작 전이면 0
    pub elapsed_sec: i64,
    /// 이미 답변한 스텝들 (생성 순서)
    pub answered_steps: Vec<InterviewStep>,
    /// 진행 중인 세션의 현재 스텝
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_step: Option<InterviewStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionPayload {
    pub step: InterviewStep,
    pub is_follow_up: bool,
    /// Base64로 인코딩된 MP3: 음성 합성에 실패하면 null
    pub audio_base64: Option<String>,
    /// 음성 인식용 임시 토큰: 발급에 실패하면 null
    pub stt_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewFinishedPayload {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// 클라이언트가 보내는 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(SessionRef),
    Ready(SessionRef),
    SubmitAnswer(SubmitAnswerPayload),
}

impl ClientEvent {
    /// 로그용 이벤트 이름
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::Ready(_) => "ready",
            ClientEvent::SubmitAnswer(_) => "submit-answer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerPayload {
    pub step_id: String,
    pub answer: String,
    /// 답변에 걸린 시간(초)
    pub duration: i64,
}
