//! # 면접 세션 API 라우트 핸들러
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/interviews | `create_interview` | 세션 생성 + 백그라운드 질문 준비 시작 |
//! | GET | /api/v1/interviews/{id} | `get_interview` | 세션과 스텝 조회 (소유자만) |
//! | GET | /api/v1/interviews/{id}/stt-token | `issue_stt_token` | 음성 인식 임시 토큰 재발급 (소유자만) |
//!
//! ## 생성 흐름
//! ```text
//! 1. multipart 요청 (회사/직무 정보 + 자기소개서/포트폴리오 PDF)
//! 2. 세션 행 생성 (PENDING) → 201 { sessionId } 즉시 응답
//! 3. 백그라운드: 업로드 → 텍스트 추출 → 질문 생성 → READY
//! 4. 클라이언트는 웹소켓으로 join-room 후 questions-ready를 기다림
//! ```

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
};

/// 업로드 요청 최대 크기 (PDF 두 개 포함)
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// multipart 본문에서 모은 값들
#[derive(Default)]
struct CreateForm {
    session_id: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    job_spec: Option<String>,
    ideal_talent: Option<String>,
    cover_letter: Option<DocumentPayload>,
    portfolio: Option<DocumentPayload>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

async fn read_form(mut multipart: Multipart) -> Result<CreateForm, AppError> {
    let mut form = CreateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "coverLetter" | "portfolio" => {
                // PDF만 허용합니다
                if field.content_type() != Some("application/pdf") {
                    return Err(AppError::UnsupportedMediaType(format!(
                        "{} must be a PDF file",
                        name
                    )));
                }
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec();

                let document = Some(DocumentPayload { filename, bytes });
                if name == "coverLetter" {
                    form.cover_letter = document;
                } else {
                    form.portfolio = document;
                }
            }
            _ => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                match name.as_str() {
                    "sessionId" => form.session_id = Some(text),
                    "company" => form.company = Some(text),
                    "jobTitle" => form.job_title = Some(text),
                    "jobSpec" => form.job_spec = Some(text),
                    "idealTalent" => form.ideal_talent = Some(text),
                    // 알 수 없는 필드는 무시
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

/// 클라이언트가 지정한 세션 ID 형식 검사: `[A-Za-z0-9_-]{1,64}`
fn is_valid_session_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `POST /api/v1/interviews`: 면접 세션을 만들고 질문 준비를 시작합니다.
///
/// 질문 생성은 오래 걸리므로 기다리지 않고 바로 `201 { "sessionId" }`를 반환합니다.
/// 준비 결과는 웹소켓 방으로 전달됩니다.
pub async fn create_interview(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateInterviewResponse>), AppError> {
    let form = read_form(multipart).await?;

    let profile = InterviewProfile {
        company: required(form.company, "company")?,
        job_title: required(form.job_title, "jobTitle")?,
        job_spec: required(form.job_spec, "jobSpec")?,
        ideal_talent: form.ideal_talent.unwrap_or_default(),
    };
    let cover_letter = form
        .cover_letter
        .ok_or_else(|| AppError::BadRequest("coverLetter is required".to_string()))?;
    let portfolio = form
        .portfolio
        .ok_or_else(|| AppError::BadRequest("portfolio is required".to_string()))?;

    // 세션 ID는 클라이언트가 지정할 수도 있습니다. 저장 키에 그대로 들어가므로 형식을 제한합니다
    let session_id = match form.session_id.filter(|id| !id.trim().is_empty()) {
        Some(id) if is_valid_session_id(&id) => id,
        Some(_) => {
            return Err(AppError::BadRequest(
                "sessionId may only contain letters, digits, '-' and '_' (max 64)".to_string(),
            ))
        }
        None => uuid::Uuid::now_v7().to_string(),
    };

    let count = db::count_sessions_for_company(&state.pool, &auth.user_id, &profile.company).await?;
    let title = format!("{} interview {}", profile.company, count + 1);

    let session = db::create_session(
        &state.pool,
        &NewInterviewSession {
            id: &session_id,
            user_id: &auth.user_id,
            title: &title,
            profile: &profile,
        },
    )
    .await
    .map_err(|e| match e {
        // 같은 ID가 이미 있으면 기본 키 제약이 막아 줍니다
        AppError::Database(ref db_err)
            if db_err
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation()) =>
        {
            AppError::BadRequest(format!("Session {} already exists", session_id))
        }
        other => other,
    })?;

    tracing::info!(session_id = %session.id, user_id = %auth.user_id, "Interview session created");

    state
        .registry
        .start_background_setup(
            &session.id,
            SetupRequest {
                profile,
                cover_letter,
                portfolio,
            },
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateInterviewResponse {
            session_id: session.id,
        }),
    ))
}

/// `GET /api/v1/interviews/{id}`: 세션과 스텝 목록(생성 순서)을 조회합니다.
pub async fn get_interview(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session = db::get_session(&state.pool, &id)
        .await?
        .ok_or(AppError::NotFound)?;

    if session.user_id != auth.user_id {
        return Err(AppError::Forbidden(
            "You do not have access to this interview".to_string(),
        ));
    }

    let steps = db::list_steps(&state.pool, &id).await?;
    Ok(Json(json!({ "session": session, "steps": steps })))
}

/// `GET /api/v1/interviews/{id}/stt-token`: 음성 인식 임시 토큰을 새로 발급합니다.
///
/// 질문마다 토큰이 함께 전달되지만, 토큰이 만료되었거나 발급에 실패했을 때
/// 클라이언트가 따로 다시 받을 수 있습니다. 응답: `201 { "data": { "value" } }`
pub async fn issue_stt_token(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let session = db::get_session(&state.pool, &id)
        .await?
        .ok_or(AppError::NotFound)?;

    if session.user_id != auth.user_id {
        return Err(AppError::Forbidden(
            "You do not have access to this interview".to_string(),
        ));
    }

    let token = state
        .registry
        .engine()
        .speech()
        .issue_stt_token()
        .await
        .map_err(|e| AppError::Internal(format!("STT token issuance failed: {}", e)))?;

    Ok((StatusCode::CREATED, Json(json!({ "data": { "value": token } }))))
}
