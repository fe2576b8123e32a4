//! # 면접 세션 데이터베이스 쿼리 모듈
//!
//! `interview_sessions` 테이블에 대한 쿼리 함수들입니다.
//!
//! 상태 전이는 모두 **조건부 UPDATE**로 구현합니다.
//! `WHERE status = ?`를 함께 걸어, 예상한 상태에서만 전이가 일어나고
//! 실제로 바뀌었는지를 `bool`로 돌려줍니다.
//!
//! ```text
//! transition_status(PENDING → READY)   → true  (1행 변경)
//! transition_status(PENDING → READY)   → false (이미 READY라 0행 변경)
//! ```

use crate::error::AppError;
use crate::models::*;
use sqlx::SqlitePool;

/// 새 면접 세션을 PENDING 상태로 생성합니다.
///
/// 문서 위치(cover_letter, portfolio)는 백그라운드 준비 작업에서 나중에 채웁니다.
pub async fn create_session(
    pool: &SqlitePool,
    new: &NewInterviewSession<'_>,
) -> Result<InterviewSession, AppError> {
    sqlx::query(
        r#"
        INSERT INTO interview_sessions
            (id, user_id, title, company, job_title, job_spec, ideal_talent)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.id)
    .bind(new.user_id)
    .bind(new.title)
    .bind(&new.profile.company)
    .bind(&new.profile.job_title)
    .bind(&new.profile.job_spec)
    .bind(&new.profile.ideal_talent)
    .execute(pool)
    .await?;

    // 생성 직후 조회하여 DB 기본값(status, created_at 등)이 채워진 객체를 반환
    get_session(pool, new.id)
        .await?
        .ok_or(AppError::Internal(
            "Failed to retrieve created interview session".to_string(),
        ))
}

/// ID로 세션 하나를 조회합니다.
pub async fn get_session(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<InterviewSession>, AppError> {
    let session = sqlx::query_as::<_, InterviewSession>(
        r#"
        SELECT id, user_id, title, company, job_title, job_spec, ideal_talent,
               cover_letter, portfolio, current_question_index, status,
               started_at, created_at, updated_at
        FROM interview_sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// 사용자가 같은 회사로 만든 세션 수: 제목 "<회사> interview <n>" 생성에 사용
pub async fn count_sessions_for_company(
    pool: &SqlitePool,
    user_id: &str,
    company: &str,
) -> Result<i64, AppError> {
    let (count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM interview_sessions WHERE user_id = ? AND company = ?",
    )
    .bind(user_id)
    .bind(company)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// 업로드가 끝난 문서들의 위치를 기록합니다.
pub async fn update_session_documents(
    pool: &SqlitePool,
    id: &str,
    cover_letter: &str,
    portfolio: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE interview_sessions
        SET cover_letter = ?,
            portfolio = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
        "#,
    )
    .bind(cover_letter)
    .bind(portfolio)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// 세션 상태를 `from`에서 `to`로 전이합니다.
///
/// ## 반환값
/// - `Ok(true)`: 전이 성공
/// - `Ok(false)`: 세션이 없거나 `from` 상태가 아니어서 아무것도 바뀌지 않음
pub async fn transition_status(
    pool: &SqlitePool,
    id: &str,
    from: SessionStatus,
    to: SessionStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE interview_sessions
        SET status = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// READY → IN_PROGRESS 전이와 함께 시작 시각을 기록합니다.
pub async fn start_session(pool: &SqlitePool, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE interview_sessions
        SET status = 'IN_PROGRESS',
            started_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND status = 'READY'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// 메인 질문 인덱스를 `from_index`에서 1 증가시킵니다.
///
/// 인덱스 비교와 쓰기가 한 문장이라, 같은 인덱스에서 두 번 전진하는 일이 없습니다.
/// 진행 중(IN_PROGRESS)인 세션에서만 동작합니다.
pub async fn advance_question_index(
    pool: &SqlitePool,
    id: &str,
    from_index: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE interview_sessions
        SET current_question_index = current_question_index + 1,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND status = 'IN_PROGRESS' AND current_question_index = ?
        "#,
    )
    .bind(id)
    .bind(from_index)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
