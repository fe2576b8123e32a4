//! # 면접 상태 머신
//!
//! 세션 하나에 대한 모든 상태 전이가 여기서 일어납니다.
//! 상태를 바꾸는 함수들은 `SessionRegistry`의 세션 액터 안에서만 호출되므로,
//! 같은 세션에 대한 두 작업이 동시에 실행되는 일은 없습니다.
//! 예외는 `prepare_questions`로, 상태를 바꾸지 않고 액터 밖에서 실행됩니다.
//!
//! ## 작업 흐름
//! ```text
//! prepare_questions        PENDING               (문서 업로드 → 텍스트 추출 → 질문 생성)
//! finish_setup             PENDING → READY       (스텝 저장)
//! ready                    READY → IN_PROGRESS   (첫 질문 전달)
//! submit_answer            IN_PROGRESS           (답변 저장 → 평가 → 꼬리 질문 또는 다음 메인 질문)
//!                          IN_PROGRESS → COMPLETED (마지막 메인 질문 이후)
//! ```
//!
//! 상태는 메모리에 들고 있지 않습니다. 매 작업마다 세션과 스텝을 DB에서 다시 읽습니다.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::cursor::{self, Cursor};
use crate::db;
use crate::error::InterviewError;
use crate::models::*;
use crate::services::ai_client::{
    evaluation_summary, AiGateway, AnsweredQuestion, EvaluationRequest, FollowupRequest,
    QuestionGenerationRequest, ShownQuestion, UserInfo,
};
use crate::services::rooms::{ConnectionSender, RoomBroadcaster};
use crate::services::speech::SpeechService;
use crate::services::storage::{document_key, ObjectStorage};

/// 꼬리 질문 요청의 추궁 강도 상한
const MAX_DEPTH: i64 = 3;

/// 클라이언트가 제출한 답변
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub step_id: String,
    pub answer: String,
    pub duration_sec: i64,
}

impl From<SubmitAnswerPayload> for AnswerSubmission {
    fn from(payload: SubmitAnswerPayload) -> Self {
        Self {
            step_id: payload.step_id,
            answer: payload.answer,
            duration_sec: payload.duration,
        }
    }
}

fn setup_failed(e: impl std::fmt::Display) -> InterviewError {
    InterviewError::SetupFailed(e.to_string())
}

fn question_failed(e: impl std::fmt::Display) -> InterviewError {
    InterviewError::QuestionProcessingFailed(e.to_string())
}

fn answer_failed(e: impl std::fmt::Display) -> InterviewError {
    InterviewError::AnswerProcessingFailed(e.to_string())
}

fn fetch_failed(e: impl std::fmt::Display) -> InterviewError {
    InterviewError::SessionFetchFailed(e.to_string())
}

/// 상태 머신과 협력자들 (DB, AI 서버, 음성, 저장소, 방 브로드캐스터)
#[derive(Clone)]
pub struct InterviewEngine {
    pool: SqlitePool,
    ai: Arc<dyn AiGateway>,
    speech: Arc<dyn SpeechService>,
    storage: Arc<dyn ObjectStorage>,
    rooms: Arc<dyn RoomBroadcaster>,
    max_followups: i64,
}

impl InterviewEngine {
    pub fn new(
        pool: SqlitePool,
        ai: Arc<dyn AiGateway>,
        speech: Arc<dyn SpeechService>,
        storage: Arc<dyn ObjectStorage>,
        rooms: Arc<dyn RoomBroadcaster>,
        max_followups: i64,
    ) -> Self {
        Self {
            pool,
            ai,
            speech,
            storage,
            rooms,
            max_followups,
        }
    }

    pub fn rooms(&self) -> &Arc<dyn RoomBroadcaster> {
        &self.rooms
    }

    pub fn speech(&self) -> &Arc<dyn SpeechService> {
        &self.speech
    }

    async fn load_session(&self, session_id: &str) -> Result<InterviewSession, InterviewError> {
        db::get_session(&self.pool, session_id)
            .await
            .map_err(fetch_failed)?
            .ok_or_else(|| InterviewError::SessionNotFound(session_id.to_string()))
    }

    // ── 백그라운드 준비 ──
    //
    // 업로드/추출/생성은 오래 걸리므로 세션 액터 밖에서 `prepare_questions`로 돌리고,
    // 저장과 상태 전이만 `finish_setup`으로 액터 안에서 처리합니다.

    /// 준비를 시작해도 되는 세션인지 확인합니다. PENDING이 아니면 false.
    pub async fn needs_setup(&self, session_id: &str) -> Result<bool, InterviewError> {
        let session = self.load_session(session_id).await?;
        if session.status != SessionStatus::Pending {
            tracing::warn!(session_id, status = ?session.status, "Setup skipped, session is not pending");
            return Ok(false);
        }
        Ok(true)
    }

    /// 준비 결과를 저장하고 세션을 READY로 만든 뒤 방에 `questions-ready`를 보냅니다.
    ///
    /// 실패하면 세션을 FAILED로 바꾸고 방에 `error`를 보냅니다.
    pub async fn finish_setup(
        &self,
        session_id: &str,
        prepared: Result<Vec<NewStep>, InterviewError>,
    ) -> Result<(), InterviewError> {
        let stored = match prepared {
            Ok(new_steps) => self.store_questions(session_id, &new_steps).await,
            Err(err) => Err(err),
        };

        match stored {
            Ok(count) => {
                tracing::info!(session_id, count, "Interview questions are ready");
                self.rooms.emit(
                    session_id,
                    ServerEvent::QuestionsReady(QuestionsReadyPayload {
                        session_id: session_id.to_string(),
                        elapsed_sec: 0,
                        answered_steps: Vec::new(),
                        current_step: None,
                    }),
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(session_id, error = %err, "Interview setup failed");
                match db::transition_status(
                    &self.pool,
                    session_id,
                    SessionStatus::Pending,
                    SessionStatus::Failed,
                )
                .await
                {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(session_id, "Session left PENDING before it could be failed"),
                    Err(e) => tracing::error!(session_id, error = %e, "Could not mark session as failed"),
                }
                self.rooms.emit(session_id, ServerEvent::error(&err));
                Err(err)
            }
        }
    }

    /// 문서 업로드, 텍스트 추출, 질문 생성까지 수행하고 저장할 스텝 목록을 돌려줍니다.
    /// 세션 상태는 바꾸지 않습니다.
    pub async fn prepare_questions(
        &self,
        session_id: &str,
        request: &SetupRequest,
    ) -> Result<Vec<NewStep>, InterviewError> {
        // 1. 문서 업로드 (병렬)
        let cover_key = document_key(session_id, "coverLetter", &request.cover_letter.filename);
        let portfolio_key = document_key(session_id, "portfolio", &request.portfolio.filename);
        let (cover_letter_url, portfolio_url) = tokio::try_join!(
            self.storage
                .put(&cover_key, &request.cover_letter.bytes, "application/pdf"),
            self.storage
                .put(&portfolio_key, &request.portfolio.bytes, "application/pdf"),
        )
        .map_err(setup_failed)?;

        db::update_session_documents(&self.pool, session_id, &cover_letter_url, &portfolio_url)
            .await
            .map_err(setup_failed)?;

        // 2. 텍스트 추출 (병렬, 둘 다 성공해야 함)
        let (resume_text, portfolio_text) = tokio::try_join!(
            self.ai.extract_text(session_id, &request.cover_letter),
            self.ai.extract_text(session_id, &request.portfolio),
        )
        .map_err(setup_failed)?;

        // 3. 질문 생성
        let generation = QuestionGenerationRequest {
            user_info: UserInfo {
                resume_text,
                portfolio_text,
                company: request.profile.company.clone(),
                desired_role: request.profile.job_title.clone(),
                core_values: request.profile.ideal_talent.clone(),
            },
        };
        let questions = self
            .ai
            .generate_questions(session_id, &generation)
            .await
            .map_err(setup_failed)?;

        if questions.is_empty() {
            return Err(setup_failed("AI server returned no questions"));
        }

        Ok(questions
            .into_iter()
            .map(|q| NewStep {
                parent_step_id: None,
                ai_question_id: q.main_question_id,
                question_type: q.category.into(),
                question: q.question,
                criteria: q.criteria,
                skills: q.skills,
                rationale: q.rationale,
                estimated_answer_time_sec: q.estimated_answer_time_sec,
            })
            .collect())
    }

    /// 스텝을 한 트랜잭션으로 저장하고 PENDING → READY로 옮깁니다.
    async fn store_questions(
        &self,
        session_id: &str,
        new_steps: &[NewStep],
    ) -> Result<usize, InterviewError> {
        let steps = db::create_steps_batch(&self.pool, session_id, new_steps)
            .await
            .map_err(question_failed)?;

        let moved = db::transition_status(
            &self.pool,
            session_id,
            SessionStatus::Pending,
            SessionStatus::Ready,
        )
        .await
        .map_err(question_failed)?;
        if !moved {
            return Err(question_failed("session left PENDING during setup"));
        }

        Ok(steps.len())
    }

    // ── 방 입장 ──

    /// 소유자를 확인한 뒤 연결을 방에 넣고, 현재 스냅샷을 그 연결에 다시 보냅니다.
    pub async fn join(
        &self,
        session_id: &str,
        user_id: &str,
        conn_id: &str,
        sender: ConnectionSender,
    ) -> Result<(), InterviewError> {
        let session = self.load_session(session_id).await?;
        if session.user_id != user_id {
            return Err(InterviewError::AccessDenied(session_id.to_string()));
        }

        let steps = db::list_steps(&self.pool, session_id)
            .await
            .map_err(fetch_failed)?;

        self.rooms.join(session_id, conn_id, sender);
        tracing::info!(session_id, conn_id, "Connection joined interview room");

        if !steps.is_empty() {
            let current_step = match session.status {
                SessionStatus::InProgress => match cursor::locate(session.current_question_index, &steps) {
                    Cursor::Awaiting(step) => Some(step.clone()),
                    _ => None,
                },
                _ => None,
            };

            self.rooms.send_to(
                conn_id,
                ServerEvent::QuestionsReady(QuestionsReadyPayload {
                    session_id: session_id.to_string(),
                    elapsed_sec: session.elapsed_sec(),
                    answered_steps: cursor::answered_steps(&steps),
                    current_step,
                }),
            );
        }

        match session.status {
            SessionStatus::Completed => {
                self.rooms.send_to(conn_id, ServerEvent::finished(session_id));
            }
            SessionStatus::Failed => {
                let err = setup_failed("setup failed earlier");
                self.rooms.send_to(conn_id, ServerEvent::error(&err));
            }
            _ => {}
        }

        Ok(())
    }

    // ── 준비 신호 ──

    /// 클라이언트의 `ready` 신호를 처리합니다.
    pub async fn ready(&self, session_id: &str, conn_id: &str) -> Result<(), InterviewError> {
        let session = self.load_session(session_id).await?;

        match session.status {
            SessionStatus::Pending => Err(InterviewError::NotReady),
            SessionStatus::Failed => {
                // 준비 실패는 요청한 연결에만 다시 알립니다
                let err = setup_failed("setup failed earlier");
                self.rooms.send_to(conn_id, ServerEvent::error(&err));
                Err(err)
            }
            SessionStatus::Completed => {
                self.rooms.send_to(conn_id, ServerEvent::finished(session_id));
                Ok(())
            }
            SessionStatus::Ready => {
                let result = self.begin(&session).await;
                if let Err(err) = &result {
                    if !err.is_rejection() {
                        tracing::error!(session_id, error = %err, "Could not start interview");
                        self.rooms.emit(session_id, ServerEvent::error(err));
                    }
                }
                result
            }
            SessionStatus::InProgress => self.resume(&session, conn_id).await,
        }
    }

    async fn begin(&self, session: &InterviewSession) -> Result<(), InterviewError> {
        let steps = db::list_steps(&self.pool, &session.id)
            .await
            .map_err(question_failed)?;
        let first = match cursor::locate(session.current_question_index, &steps) {
            Cursor::Awaiting(step) => step.clone(),
            _ => return Err(question_failed("no question at the current index")),
        };

        if !db::start_session(&self.pool, &session.id)
            .await
            .map_err(question_failed)?
        {
            return Err(InterviewError::NotReady);
        }

        tracing::info!(session_id = %session.id, step_id = %first.id, "Interview started");
        self.deliver_to_room(&session.id, &first, false).await;
        Ok(())
    }

    /// 진행 중인 세션에 다시 `ready`가 오면 현재 질문을 요청한 연결에 다시 보냅니다.
    async fn resume(&self, session: &InterviewSession, conn_id: &str) -> Result<(), InterviewError> {
        let steps = db::list_steps(&self.pool, &session.id)
            .await
            .map_err(fetch_failed)?;

        match cursor::locate(session.current_question_index, &steps) {
            Cursor::Awaiting(step) => {
                let event = self.next_question_event(step, !step.is_main()).await;
                self.rooms.send_to(conn_id, event);
                Ok(())
            }
            Cursor::Evaluated(step) => {
                tracing::info!(session_id = %session.id, step_id = %step.id, "Resuming unfinished branch");
                let step = step.clone();
                self.notify_answer_failure(&session.id, self.advance_after_evaluation(session, &step).await)
            }
            Cursor::Exhausted => {
                self.rooms.send_to(conn_id, ServerEvent::finished(&session.id));
                Ok(())
            }
        }
    }

    // ── 답변 제출 ──

    /// 답변을 검증하고 저장/평가한 뒤 다음 질문으로 진행합니다.
    ///
    /// 검증 실패는 아무것도 바꾸지 않고 `Err`만 돌려줍니다 (요청한 연결에만 알림).
    /// 검증 이후의 실패는 방 전체에 `ANSWER_PROCESSING_FAILED`를 보냅니다.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        submission: AnswerSubmission,
    ) -> Result<(), InterviewError> {
        let session = self.load_session(session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(InterviewError::NotInProgress);
        }

        let steps = db::list_steps(&self.pool, session_id)
            .await
            .map_err(fetch_failed)?;
        let step = steps
            .iter()
            .find(|s| s.id == submission.step_id)
            .ok_or_else(|| InterviewError::StepNotFound(submission.step_id.clone()))?;

        match cursor::locate(session.current_question_index, &steps) {
            Cursor::Awaiting(current) if current.id == step.id => {}
            Cursor::Evaluated(current) if current.id == step.id => {
                // 평가는 끝났지만 다음 단계로 넘어가지 못한 스텝: 재평가 없이 이어서 진행
                tracing::info!(session_id, step_id = %step.id, "Resuming branch after resubmission");
                let current = current.clone();
                return self.notify_answer_failure(
                    session_id,
                    self.advance_after_evaluation(&session, &current).await,
                );
            }
            _ if step.is_evaluated() => {
                return Err(InterviewError::AlreadyAnswered(step.id.clone()));
            }
            _ => return Err(InterviewError::StepNotCurrent(step.id.clone())),
        }

        let step = step.clone();
        let result = self.process_answer(&session, &step, &submission).await;
        self.notify_answer_failure(session_id, result)
    }

    fn notify_answer_failure(
        &self,
        session_id: &str,
        result: Result<(), InterviewError>,
    ) -> Result<(), InterviewError> {
        if let Err(err) = &result {
            tracing::error!(session_id, error = %err, "Answer processing failed");
            self.rooms.emit(session_id, ServerEvent::error(err));
        }
        result
    }

    async fn process_answer(
        &self,
        session: &InterviewSession,
        step: &InterviewStep,
        submission: &AnswerSubmission,
    ) -> Result<(), InterviewError> {
        let session_id = session.id.as_str();

        let recorded = db::record_answer(
            &self.pool,
            &step.id,
            &submission.answer,
            submission.duration_sec,
        )
        .await
        .map_err(answer_failed)?;
        if !recorded {
            return Err(answer_failed("step was evaluated concurrently"));
        }

        self.log_user_answer(
            session_id,
            AnsweredQuestion {
                question_id: step.ai_question_id.clone(),
                answer: submission.answer.clone(),
                answer_duration_sec: submission.duration_sec,
            },
        );

        let request = EvaluationRequest::for_step(step, &submission.answer, submission.duration_sec);
        let result = self
            .ai
            .evaluate_answer(session_id, &request)
            .await
            .map_err(answer_failed)?;

        tracing::info!(
            session_id,
            step_id = %step.id,
            score = result.overall_score,
            tail_decision = ?result.tail_decision,
            "Answer evaluated"
        );

        let evaluation = StepEvaluation {
            score: result.overall_score,
            feedback: result.feedback,
            strengths: result.strengths,
            improvements: result.improvements,
            red_flags: result.red_flags,
            criterion_scores: result.criterion_scores,
            tail_decision: result.tail_decision,
            tail_rationale: result.tail_rationale,
        };
        let stored = db::record_evaluation(&self.pool, &step.id, &evaluation)
            .await
            .map_err(answer_failed)?;
        if !stored {
            return Err(answer_failed("step was evaluated concurrently"));
        }

        let evaluated = db::get_step(&self.pool, &step.id)
            .await
            .map_err(answer_failed)?
            .ok_or_else(|| answer_failed("evaluated step disappeared"))?;

        self.advance_after_evaluation(session, &evaluated).await
    }

    /// 평가가 끝난 스텝 다음의 분기: 꼬리 질문을 만들거나 다음 메인 질문으로 넘어갑니다.
    async fn advance_after_evaluation(
        &self,
        session: &InterviewSession,
        step: &InterviewStep,
    ) -> Result<(), InterviewError> {
        let steps = db::list_steps(&self.pool, &session.id)
            .await
            .map_err(answer_failed)?;
        let root = steps
            .iter()
            .find(|s| s.id == step.root_id())
            .ok_or_else(|| answer_failed("main step of the answered step is missing"))?;

        let followups = cursor::followup_count(&root.id, &steps);
        let decision = cursor::effective_decision(
            step.tail_decision.unwrap_or(TailDecision::Skip),
            followups,
            self.max_followups,
        );

        match decision {
            TailDecision::Create => self.create_followup(&session.id, root, step, followups + 1).await,
            TailDecision::Skip => self.advance_main(session, &steps).await,
        }
    }

    async fn create_followup(
        &self,
        session_id: &str,
        root: &InterviewStep,
        answered: &InterviewStep,
        n: i64,
    ) -> Result<(), InterviewError> {
        let request = FollowupRequest {
            question_id: root.ai_question_id.clone(),
            category: root.question_type.into(),
            question_text: answered.question.clone(),
            criteria: root.criteria.0.clone(),
            skills: root.skills.0.clone(),
            user_answer: answered.answer.clone().unwrap_or_default(),
            evaluation_summary: evaluation_summary(&answered.strengths, &answered.improvements),
            depth: n.min(MAX_DEPTH),
            next_followup_index: n,
        };

        let generated = self
            .ai
            .generate_followup(session_id, &request)
            .await
            .map_err(answer_failed)?;

        let new_step = NewStep {
            // 꼬리 질문의 부모는 항상 메인 질문
            parent_step_id: Some(root.id.clone()),
            ai_question_id: cursor::followup_ai_id(&root.ai_question_id, n),
            question_type: root.question_type,
            question: generated.question,
            criteria: cursor::narrow_criteria(&generated.focus_criteria, &root.criteria),
            skills: root.skills.0.clone(),
            rationale: generated.rationale,
            estimated_answer_time_sec: generated.expected_answer_time_sec,
        };

        let followup = db::create_step(&self.pool, session_id, &new_step)
            .await
            .map_err(answer_failed)?;

        tracing::info!(session_id, step_id = %followup.id, n, "Follow-up question created");
        self.deliver_to_room(session_id, &followup, true).await;
        Ok(())
    }

    async fn advance_main(
        &self,
        session: &InterviewSession,
        steps: &[InterviewStep],
    ) -> Result<(), InterviewError> {
        let index = session.current_question_index;
        let mains = cursor::main_steps(steps);
        let next = index + 1;

        let Some(next_step) = usize::try_from(next).ok().and_then(|i| mains.get(i).copied()) else {
            let completed = db::transition_status(
                &self.pool,
                &session.id,
                SessionStatus::InProgress,
                SessionStatus::Completed,
            )
            .await
            .map_err(answer_failed)?;
            if !completed {
                return Err(answer_failed("session is no longer in progress"));
            }

            tracing::info!(session_id = %session.id, "Last main question answered, interview finished");
            self.rooms.emit(&session.id, ServerEvent::finished(&session.id));
            return Ok(());
        };

        if !db::advance_question_index(&self.pool, &session.id, index)
            .await
            .map_err(answer_failed)?
        {
            return Err(answer_failed("question index moved concurrently"));
        }

        tracing::info!(session_id = %session.id, index = next, "Moved to next main question");
        self.deliver_to_room(&session.id, next_step, false).await;
        Ok(())
    }

    // ── 질문 전달 ──

    async fn deliver_to_room(&self, session_id: &str, step: &InterviewStep, is_follow_up: bool) {
        let event = self.next_question_event(step, is_follow_up).await;
        self.log_shown_question(session_id, step);
        self.rooms.emit(session_id, event);
    }

    /// 음성과 STT 토큰을 붙인 `next-question` 이벤트. 둘 다 실패하면 null로 보냅니다.
    async fn next_question_event(&self, step: &InterviewStep, is_follow_up: bool) -> ServerEvent {
        let (audio, token) = tokio::join!(
            self.speech.synthesize(&step.question),
            self.speech.issue_stt_token()
        );

        let audio_base64 = audio
            .map_err(|e| tracing::warn!(step_id = %step.id, error = %e, "TTS unavailable"))
            .ok();
        let stt_token = token
            .map_err(|e| tracing::warn!(step_id = %step.id, error = %e, "STT token unavailable"))
            .ok();

        ServerEvent::NextQuestion(NextQuestionPayload {
            step: step.clone(),
            is_follow_up,
            audio_base64,
            stt_token,
        })
    }

    fn log_shown_question(&self, session_id: &str, step: &InterviewStep) {
        let ai = Arc::clone(&self.ai);
        let session_id = session_id.to_string();
        let question = ShownQuestion::from(step);
        tokio::spawn(async move {
            if let Err(e) = ai.log_shown_question(&session_id, &question).await {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to log shown question");
            }
        });
    }

    fn log_user_answer(&self, session_id: &str, answer: AnsweredQuestion) {
        let ai = Arc::clone(&self.ai);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = ai.log_user_answer(&session_id, &answer).await {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to log user answer");
            }
        });
    }
}
