//! # AI 서버 클라이언트
//!
//! 질문 생성, 답변 평가, 꼬리 질문 생성, 면접 메모리 기록을 담당하는 외부 AI 서버와의 경계입니다.
//!
//! 모든 요청에는 `X-Session-Id` 헤더가 붙습니다. AI 서버는 이 값으로 세션별 대화 메모리를 구분합니다.
//!
//! | 메서드 | 엔드포인트 |
//! |--------|-----------|
//! | `extract_text` | `POST /api/v1/pdf/pdf-text-parsing` (multipart) |
//! | `generate_questions` | `POST /api/v1/question/question-generating` |
//! | `evaluate_answer` | `POST /api/v1/evaluation/answer-evaluating` |
//! | `generate_followup` | `POST /api/v1/followup/followup-generating` |
//! | `log_shown_question` | `POST /api/v1/session-log/log/question-shown` |
//! | `log_user_answer` | `POST /api/v1/session-log/log/user-answer` |

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{CriterionScore, DocumentPayload, InterviewStep, QuestionType, TailDecision};

const SESSION_HEADER: &str = "X-Session-Id";

/// AI 서버 호출 에러
#[derive(Debug, Error)]
pub enum AiClientError {
    #[error("AI server request failed: {0}")]
    Network(String),

    #[error("AI server timed out")]
    Timeout,

    #[error("AI server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected AI server response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AiClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiClientError::Timeout
        } else if e.is_decode() {
            AiClientError::Parse(e.to_string())
        } else {
            AiClientError::Network(e.to_string())
        }
    }
}

/// AI 서버가 쓰는 질문 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiCategory {
    Behavioral,
    Technical,
    Tailored,
}

impl From<AiCategory> for QuestionType {
    fn from(category: AiCategory) -> Self {
        match category {
            AiCategory::Behavioral => QuestionType::Personality,
            AiCategory::Technical => QuestionType::Technical,
            AiCategory::Tailored => QuestionType::Tailored,
        }
    }
}

impl From<QuestionType> for AiCategory {
    fn from(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Personality => AiCategory::Behavioral,
            QuestionType::Technical => AiCategory::Technical,
            QuestionType::Tailored => AiCategory::Tailored,
        }
    }
}

// ── 질문 생성 ──

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub resume_text: String,
    pub portfolio_text: String,
    pub company: String,
    pub desired_role: String,
    pub core_values: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionGenerationRequest {
    pub user_info: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub main_question_id: String,
    pub category: AiCategory,
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    pub question: String,
    #[serde(default)]
    pub estimated_answer_time_sec: Option<i64>,
}

// ── 답변 평가 ──

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub question_id: String,
    pub category: AiCategory,
    pub criteria: Vec<String>,
    pub skills: Vec<String>,
    pub question_text: String,
    pub user_answer: String,
    pub answer_duration_sec: i64,
}

impl EvaluationRequest {
    pub fn for_step(step: &InterviewStep, answer: &str, duration_sec: i64) -> Self {
        Self {
            question_id: step.ai_question_id.clone(),
            category: step.question_type.into(),
            criteria: step.criteria.0.clone(),
            skills: step.skills.0.clone(),
            question_text: step.question.clone(),
            user_answer: answer.to_string(),
            answer_duration_sec: duration_sec,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub answer_duration_sec: Option<i64>,
    pub overall_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub criterion_scores: Vec<CriterionScore>,
    #[serde(default)]
    pub feedback: String,
    pub tail_decision: TailDecision,
    #[serde(default)]
    pub tail_rationale: Option<String>,
}

/// 꼬리 질문 요청에 넣는 평가 요약: `"Strengths: a, b, Improvements: c"`
pub fn evaluation_summary(strengths: &[String], improvements: &[String]) -> String {
    format!(
        "Strengths: {}, Improvements: {}",
        strengths.join(", "),
        improvements.join(", ")
    )
}

// ── 꼬리 질문 ──

#[derive(Debug, Clone, Serialize)]
pub struct FollowupRequest {
    /// 메인 질문의 AI ID
    pub question_id: String,
    pub category: AiCategory,
    /// 방금 답변한 질문 본문
    pub question_text: String,
    pub criteria: Vec<String>,
    pub skills: Vec<String>,
    pub user_answer: String,
    pub evaluation_summary: String,
    /// 추궁 강도 (1~3)
    pub depth: i64,
    /// 생성할 꼬리 질문 번호 (1부터)
    pub next_followup_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFollowup {
    #[serde(default)]
    pub followup_id: Option<String>,
    #[serde(default)]
    pub parent_question_id: Option<String>,
    #[serde(default)]
    pub focus_criteria: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    pub question: String,
    #[serde(default)]
    pub expected_answer_time_sec: Option<i64>,
}

// ── 메모리 기록 ──

#[derive(Debug, Clone, Serialize)]
pub struct ShownQuestion {
    pub main_question_id: String,
    pub category: AiCategory,
    pub question_text: String,
    pub criteria: Vec<String>,
    pub skills: Vec<String>,
    pub rationale: Option<String>,
    pub estimated_answer_time_sec: Option<i64>,
}

impl From<&InterviewStep> for ShownQuestion {
    fn from(step: &InterviewStep) -> Self {
        Self {
            main_question_id: step.ai_question_id.clone(),
            category: step.question_type.into(),
            question_text: step.question.clone(),
            criteria: step.criteria.0.clone(),
            skills: step.skills.0.clone(),
            rationale: step.rationale.clone(),
            estimated_answer_time_sec: step.estimated_answer_time_sec,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnsweredQuestion {
    pub question_id: String,
    pub answer: String,
    pub answer_duration_sec: i64,
}

#[derive(Debug, Deserialize)]
struct ExtractedText {
    #[allow(dead_code)]
    #[serde(default)]
    filename: Option<String>,
    extracted_text: String,
}

/// AI 서버 경계: 테스트에서는 스크립트로 동작하는 가짜 구현으로 교체합니다.
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn extract_text(
        &self,
        session_id: &str,
        document: &DocumentPayload,
    ) -> Result<String, AiClientError>;

    async fn generate_questions(
        &self,
        session_id: &str,
        request: &QuestionGenerationRequest,
    ) -> Result<Vec<GeneratedQuestion>, AiClientError>;

    async fn evaluate_answer(
        &self,
        session_id: &str,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, AiClientError>;

    async fn generate_followup(
        &self,
        session_id: &str,
        request: &FollowupRequest,
    ) -> Result<GeneratedFollowup, AiClientError>;

    async fn log_shown_question(
        &self,
        session_id: &str,
        question: &ShownQuestion,
    ) -> Result<(), AiClientError>;

    async fn log_user_answer(
        &self,
        session_id: &str,
        answer: &AnsweredQuestion,
    ) -> Result<(), AiClientError>;
}

/// reqwest 기반 AI 서버 클라이언트
pub struct HttpAiGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAiGateway {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, AiClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AiClientError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn post_json<B, R>(&self, path: &str, session_id: &str, body: &B) -> Result<R, AiClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        tracing::debug!(session_id, path, "Calling AI server");

        let request = self
            .http_client
            .post(self.url(path))
            .header(SESSION_HEADER, session_id)
            .json(body);

        let response = self.send(request).await?;
        Ok(response.json::<R>().await?)
    }

    async fn post_log<B>(&self, path: &str, session_id: &str, body: &B) -> Result<(), AiClientError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self
            .http_client
            .post(self.url(path))
            .header(SESSION_HEADER, session_id)
            .json(body);

        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl AiGateway for HttpAiGateway {
    async fn extract_text(
        &self,
        session_id: &str,
        document: &DocumentPayload,
    ) -> Result<String, AiClientError> {
        let part = reqwest::multipart::Part::bytes(document.bytes.clone())
            .file_name(document.filename.clone())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .http_client
            .post(self.url("/api/v1/pdf/pdf-text-parsing"))
            .header(SESSION_HEADER, session_id)
            .multipart(form);

        let extracted: ExtractedText = self.send(request).await?.json().await?;
        tracing::debug!(
            session_id,
            filename = %document.filename,
            chars = extracted.extracted_text.chars().count(),
            "Extracted document text"
        );

        Ok(extracted.extracted_text)
    }

    async fn generate_questions(
        &self,
        session_id: &str,
        request: &QuestionGenerationRequest,
    ) -> Result<Vec<GeneratedQuestion>, AiClientError> {
        self.post_json("/api/v1/question/question-generating", session_id, request)
            .await
    }

    async fn evaluate_answer(
        &self,
        session_id: &str,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, AiClientError> {
        self.post_json("/api/v1/evaluation/answer-evaluating", session_id, request)
            .await
    }

    async fn generate_followup(
        &self,
        session_id: &str,
        request: &FollowupRequest,
    ) -> Result<GeneratedFollowup, AiClientError> {
        self.post_json("/api/v1/followup/followup-generating", session_id, request)
            .await
    }

    async fn log_shown_question(
        &self,
        session_id: &str,
        question: &ShownQuestion,
    ) -> Result<(), AiClientError> {
        let body = serde_json::json!({ "question": question });
        self.post_log("/api/v1/session-log/log/question-shown", session_id, &body)
            .await
    }

    async fn log_user_answer(
        &self,
        session_id: &str,
        answer: &AnsweredQuestion,
    ) -> Result<(), AiClientError> {
        self.post_log("/api/v1/session-log/log/user-answer", session_id, answer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maps_onto_question_type() {
        assert_eq!(QuestionType::from(AiCategory::Behavioral), QuestionType::Personality);
        assert_eq!(AiCategory::from(QuestionType::Tailored), AiCategory::Tailored);
    }

    #[test]
    fn parses_question_batch() {
        let raw = r#"[{
            "main_question_id": "q1",
            "category": "behavioral",
            "criteria": ["clarity"],
            "skills": [],
            "rationale": "culture fit",
            "question": "Tell me about a conflict.",
            "estimated_answer_time_sec": 90
        }]"#;
        let batch: Vec<GeneratedQuestion> = serde_json::from_str(raw).unwrap();
        assert_eq!(batch[0].category, AiCategory::Behavioral);
        assert_eq!(batch[0].estimated_answer_time_sec, Some(90));
    }

    #[test]
    fn evaluation_summary_lists_strengths_and_improvements() {
        let raw = r#"{
            "question_id": "q1",
            "overall_score": 4,
            "strengths": ["structure", "examples"],
            "improvements": ["metrics"],
            "tail_decision": "create"
        }"#;
        let result: EvaluationResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.tail_decision, TailDecision::Create);
        assert_eq!(
            evaluation_summary(&result.strengths, &result.improvements),
            "Strengths: structure, examples, Improvements: metrics"
        );
    }
}
