//! # 면접 스텝 모델 정의
//!
//! 스텝은 질문 하나(메인 또는 꼬리 질문)와 그 답변/평가를 담습니다.
//! 메인 스텝 아래에 꼬리 질문이 붙는 2단계 트리 구조입니다.
//!
//! ```text
//! main(q1) ── fu(q1-fu1) ── fu(q1-fu2)      ← parent_step_id는 항상 메인 스텝
//! main(q2)
//! ```

use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// 질문 유형: DB와 클라이언트에는 대문자 문자열로 전달됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Technical,
    /// 인성 질문 (AI 서버의 behavioral 카테고리)
    Personality,
    Tailored,
}

/// 평가자가 내린 꼬리 질문 생성 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TailDecision {
    Create,
    Skip,
}

/// 평가 기준 하나에 대한 점수
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

/// 면접 스텝 엔티티: DB의 `interview_steps` 테이블 한 행에 대응합니다.
///
/// 배열 컬럼(criteria, skills, strengths 등)은 `Json<Vec<_>>`로 매핑되어
/// DB에는 JSON 텍스트로, 클라이언트에는 일반 배열로 직렬화됩니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InterviewStep {
    pub id: String,
    pub session_id: String,
    /// 꼬리 질문이면 메인 스텝 ID, 메인 스텝이면 None
    pub parent_step_id: Option<String>,
    /// 세션 내 생성 순서
    pub seq: i64,
    /// AI 서버 메모리와 연결되는 질문 ID
    pub ai_question_id: String,
    pub question_type: QuestionType,
    pub question: String,
    pub criteria: Json<Vec<String>>,
    pub skills: Json<Vec<String>>,
    pub rationale: Option<String>,
    pub estimated_answer_time_sec: Option<i64>,
    pub answer: Option<String>,
    pub answer_duration_sec: Option<i64>,
    pub answered_at: Option<String>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub strengths: Json<Vec<String>>,
    pub improvements: Json<Vec<String>>,
    pub red_flags: Json<Vec<String>>,
    pub criterion_scores: Json<Vec<CriterionScore>>,
    pub tail_decision: Option<TailDecision>,
    pub tail_rationale: Option<String>,
    /// 평가가 저장된 시각: 이 값이 있으면 답변이 확정된 것입니다
    pub evaluated_at: Option<String>,
    pub created_at: String,
}

impl InterviewStep {
    pub fn is_main(&self) -> bool {
        self.parent_step_id.is_none()
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated_at.is_some()
    }

    /// 이 스텝이 속한 메인 스텝의 ID
    pub fn root_id(&self) -> &str {
        self.parent_step_id.as_deref().unwrap_or(&self.id)
    }
}

/// 스텝 생성 입력: 메인 질문 일괄 저장과 꼬리 질문 저장에 공통으로 사용
#[derive(Debug, Clone)]
pub struct NewStep {
    pub parent_step_id: Option<String>,
    pub ai_question_id: String,
    pub question_type: QuestionType,
    pub question: String,
    pub criteria: Vec<String>,
    pub skills: Vec<String>,
    pub rationale: Option<String>,
    pub estimated_answer_time_sec: Option<i64>,
}

/// 평가 결과 중 스텝에 저장되는 부분
#[derive(Debug, Clone)]
pub struct StepEvaluation {
    pub score: f64,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub red_flags: Vec<String>,
    pub criterion_scores: Vec<CriterionScore>,
    pub tail_decision: TailDecision,
    pub tail_rationale: Option<String>,
}
