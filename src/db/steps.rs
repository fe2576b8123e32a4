//! # 면접 스텝 데이터베이스 쿼리 모듈
//!
//! `interview_steps` 테이블은 **추가 전용(append-only)** 입니다.
//! 스텝은 생성된 뒤 답변과 평가만 채워지며, 개별 삭제는 없습니다.
//!
//! ## 순서
//! 세션 안에서의 생성 순서는 `seq` 컬럼이 보장합니다.
//! 같은 밀리초에 여러 행이 생겨도 `created_at`과 달리 순서가 흔들리지 않습니다.

use crate::error::AppError;
use crate::models::*;
use sqlx::{types::Json, Sqlite, SqlitePool, Transaction};

/// 스텝 SELECT 문: 모든 조회가 같은 컬럼 목록을 쓰도록 매크로로 묶었습니다.
macro_rules! select_steps {
    ($tail:literal) => {
        concat!(
            "SELECT id, session_id, parent_step_id, seq, ai_question_id, question_type, ",
            "question, criteria, skills, rationale, estimated_answer_time_sec, ",
            "answer, answer_duration_sec, answered_at, score, feedback, ",
            "strengths, improvements, red_flags, criterion_scores, ",
            "tail_decision, tail_rationale, evaluated_at, created_at ",
            "FROM interview_steps ",
            $tail
        )
    };
}

/// 메인 질문 묶음을 **하나의 트랜잭션**으로 저장합니다.
///
/// 중간에 실패하면 롤백되어 일부만 저장된 상태가 남지 않습니다.
/// 반환값은 저장된 스텝들(생성 순서)입니다.
pub async fn create_steps_batch(
    pool: &SqlitePool,
    session_id: &str,
    steps: &[NewStep],
) -> Result<Vec<InterviewStep>, AppError> {
    let mut tx = pool.begin().await?;

    for step in steps {
        insert_step(&mut tx, session_id, step).await?;
    }

    // tx가 commit 없이 drop되면 자동으로 롤백됩니다
    tx.commit().await?;

    list_steps(pool, session_id).await
}

/// 꼬리 질문 하나를 저장하고 저장된 스텝을 반환합니다.
pub async fn create_step(
    pool: &SqlitePool,
    session_id: &str,
    step: &NewStep,
) -> Result<InterviewStep, AppError> {
    let mut tx = pool.begin().await?;
    let id = insert_step(&mut tx, session_id, step).await?;
    tx.commit().await?;

    get_step(pool, &id)
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created step".to_string()))
}

/// 트랜잭션 안에서 스텝 한 행을 INSERT합니다. seq는 세션의 최댓값 + 1입니다.
async fn insert_step(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &str,
    step: &NewStep,
) -> Result<String, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    sqlx::query(
        r#"
        INSERT INTO interview_steps
            (id, session_id, parent_step_id, seq, ai_question_id, question_type,
             question, criteria, skills, rationale, estimated_answer_time_sec)
        VALUES (
            ?, ?, ?,
            (SELECT COALESCE(MAX(seq), -1) + 1 FROM interview_steps WHERE session_id = ?),
            ?, ?, ?, ?, ?, ?, ?
        )
        "#,
    )
    .bind(&id)
    .bind(session_id)
    .bind(&step.parent_step_id)
    .bind(session_id)
    .bind(&step.ai_question_id)
    .bind(step.question_type)
    .bind(&step.question)
    .bind(Json(&step.criteria))
    .bind(Json(&step.skills))
    .bind(&step.rationale)
    .bind(step.estimated_answer_time_sec)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// ID로 스텝 하나를 조회합니다.
pub async fn get_step(pool: &SqlitePool, id: &str) -> Result<Option<InterviewStep>, AppError> {
    let step = sqlx::query_as::<_, InterviewStep>(select_steps!("WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(step)
}

/// 세션의 모든 스텝을 생성 순서대로 조회합니다.
pub async fn list_steps(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<InterviewStep>, AppError> {
    let steps =
        sqlx::query_as::<_, InterviewStep>(select_steps!("WHERE session_id = ? ORDER BY seq"))
            .bind(session_id)
            .fetch_all(pool)
            .await?;

    Ok(steps)
}

/// 답변을 기록합니다.
///
/// 평가가 끝난 스텝(`evaluated_at IS NOT NULL`)은 건드리지 않습니다.
/// 답변만 저장되고 평가가 실패한 스텝은 재제출로 덮어쓸 수 있습니다.
///
/// ## 반환값
/// - `Ok(true)`: 기록됨
/// - `Ok(false)`: 이미 평가가 확정된 스텝
pub async fn record_answer(
    pool: &SqlitePool,
    step_id: &str,
    answer: &str,
    duration_sec: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE interview_steps
        SET answer = ?,
            answer_duration_sec = ?,
            answered_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND evaluated_at IS NULL
        "#,
    )
    .bind(answer)
    .bind(duration_sec)
    .bind(step_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// 평가 결과를 스텝에 저장합니다. 한 스텝의 평가는 한 번만 기록됩니다.
pub async fn record_evaluation(
    pool: &SqlitePool,
    step_id: &str,
    evaluation: &StepEvaluation,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE interview_steps
        SET score = ?,
            feedback = ?,
            strengths = ?,
            improvements = ?,
            red_flags = ?,
            criterion_scores = ?,
            tail_decision = ?,
            tail_rationale = ?,
            evaluated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND answer IS NOT NULL AND evaluated_at IS NULL
        "#,
    )
    .bind(evaluation.score)
    .bind(&evaluation.feedback)
    .bind(Json(&evaluation.strengths))
    .bind(Json(&evaluation.improvements))
    .bind(Json(&evaluation.red_flags))
    .bind(Json(&evaluation.criterion_scores))
    .bind(evaluation.tail_decision)
    .bind(&evaluation.tail_rationale)
    .bind(step_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
