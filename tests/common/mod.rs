//! Shared fixtures for the integration tests: a scripted AI gateway, stub speech,
//! and an in-memory harness wired exactly like `main.rs`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use mockview::db;
use mockview::error::InterviewError;
use mockview::models::*;
use mockview::services::ai_client::*;
use mockview::services::interview::{AnswerSubmission, InterviewEngine, SessionRegistry};
use mockview::services::rooms::InMemoryRooms;
use mockview::services::speech::{SpeechError, SpeechService};
use mockview::services::storage::LocalObjectStorage;

pub const OWNER: &str = "user-1";
pub const STRANGER: &str = "user-2";
pub const JWT_SECRET: &str = "test-secret";

// ── AI gateway ──

/// AI server double. Decisions are consumed in order; an empty queue means SKIP.
pub struct FakeAi {
    pub questions: Vec<GeneratedQuestion>,
    pub decisions: Mutex<VecDeque<TailDecision>>,
    pub fail_extract: AtomicBool,
    pub fail_generate: AtomicBool,
    pub fail_followup: AtomicBool,
    /// Number of upcoming evaluations that fail before evaluation works again
    pub failing_evaluations: AtomicUsize,
    pub evaluation_delay: Duration,
    pub extract_delay: Duration,
    /// Documents handed to `extract_text`
    pub extractions: AtomicUsize,
    pub evaluations: Mutex<Vec<EvaluationRequest>>,
    pub followups: Mutex<Vec<FollowupRequest>>,
    pub shown: Mutex<Vec<ShownQuestion>>,
    pub answers: Mutex<Vec<AnsweredQuestion>>,
}

impl FakeAi {
    pub fn new(questions: Vec<GeneratedQuestion>) -> Self {
        Self {
            questions,
            decisions: Mutex::new(VecDeque::new()),
            fail_extract: AtomicBool::new(false),
            fail_generate: AtomicBool::new(false),
            fail_followup: AtomicBool::new(false),
            failing_evaluations: AtomicUsize::new(0),
            evaluation_delay: Duration::ZERO,
            extract_delay: Duration::ZERO,
            extractions: AtomicUsize::new(0),
            evaluations: Mutex::new(Vec::new()),
            followups: Mutex::new(Vec::new()),
            shown: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_decisions(self, decisions: &[TailDecision]) -> Self {
        self.decisions.lock().unwrap().extend(decisions.iter().copied());
        self
    }

    pub fn with_evaluation_delay(mut self, delay: Duration) -> Self {
        self.evaluation_delay = delay;
        self
    }

    pub fn with_extract_delay(mut self, delay: Duration) -> Self {
        self.extract_delay = delay;
        self
    }

    pub fn followup_requests(&self) -> Vec<FollowupRequest> {
        self.followups.lock().unwrap().clone()
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.lock().unwrap().len()
    }
}

fn api_error(body: &str) -> AiClientError {
    AiClientError::Api {
        status: 500,
        body: body.to_string(),
    }
}

#[async_trait]
impl AiGateway for FakeAi {
    async fn extract_text(
        &self,
        _session_id: &str,
        document: &DocumentPayload,
    ) -> Result<String, AiClientError> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        if !self.extract_delay.is_zero() {
            tokio::time::sleep(self.extract_delay).await;
        }
        if self.fail_extract.load(Ordering::SeqCst) {
            return Err(api_error("unreadable pdf"));
        }
        Ok(format!("text of {}", document.filename))
    }

    async fn generate_questions(
        &self,
        _session_id: &str,
        _request: &QuestionGenerationRequest,
    ) -> Result<Vec<GeneratedQuestion>, AiClientError> {
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(AiClientError::Timeout);
        }
        Ok(self.questions.clone())
    }

    async fn evaluate_answer(
        &self,
        _session_id: &str,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, AiClientError> {
        if !self.evaluation_delay.is_zero() {
            tokio::time::sleep(self.evaluation_delay).await;
        }
        self.evaluations.lock().unwrap().push(request.clone());

        let failing = self
            .failing_evaluations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(api_error("evaluator crashed"));
        }

        let decision = self
            .decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TailDecision::Skip);

        Ok(EvaluationResult {
            question_id: request.question_id.clone(),
            category: None,
            answer_duration_sec: Some(request.answer_duration_sec),
            overall_score: 3.5,
            strengths: vec!["structure".to_string()],
            improvements: vec!["metrics".to_string()],
            red_flags: Vec::new(),
            criterion_scores: vec![CriterionScore {
                name: "clarity".to_string(),
                score: 4.0,
                reason: "clear".to_string(),
            }],
            feedback: "Solid answer".to_string(),
            tail_decision: decision,
            tail_rationale: Some("dig deeper".to_string()),
        })
    }

    async fn generate_followup(
        &self,
        _session_id: &str,
        request: &FollowupRequest,
    ) -> Result<GeneratedFollowup, AiClientError> {
        if self.fail_followup.load(Ordering::SeqCst) {
            return Err(AiClientError::Network("connection reset".to_string()));
        }
        self.followups.lock().unwrap().push(request.clone());

        Ok(GeneratedFollowup {
            followup_id: Some(format!("ai-side-{}", request.next_followup_index)),
            parent_question_id: Some(request.question_id.clone()),
            focus_criteria: vec!["clarity".to_string(), "invented".to_string()],
            rationale: Some("answer lacked numbers".to_string()),
            question: format!(
                "Follow-up {} for {}",
                request.next_followup_index, request.question_id
            ),
            expected_answer_time_sec: Some(60),
        })
    }

    async fn log_shown_question(
        &self,
        _session_id: &str,
        question: &ShownQuestion,
    ) -> Result<(), AiClientError> {
        self.shown.lock().unwrap().push(question.clone());
        Ok(())
    }

    async fn log_user_answer(
        &self,
        _session_id: &str,
        answer: &AnsweredQuestion,
    ) -> Result<(), AiClientError> {
        self.answers.lock().unwrap().push(answer.clone());
        Ok(())
    }
}

pub fn question(id: &str, category: AiCategory, criteria: &[&str]) -> GeneratedQuestion {
    GeneratedQuestion {
        main_question_id: id.to_string(),
        category,
        criteria: criteria.iter().map(|c| c.to_string()).collect(),
        skills: vec!["rust".to_string()],
        rationale: Some(format!("why {}", id)),
        question: format!("Question {}?", id),
        estimated_answer_time_sec: Some(120),
    }
}

pub fn three_questions() -> Vec<GeneratedQuestion> {
    vec![
        question("q1", AiCategory::Technical, &["clarity", "depth"]),
        question("q2", AiCategory::Behavioral, &["ownership"]),
        question("q3", AiCategory::Tailored, &["fit"]),
    ]
}

// ── Speech ──

pub struct StubSpeech {
    pub available: bool,
}

#[async_trait]
impl SpeechService for StubSpeech {
    async fn synthesize(&self, _text: &str) -> Result<String, SpeechError> {
        if self.available {
            Ok("QVVESU8=".to_string())
        } else {
            Err(SpeechError::NotConfigured("TTS_API_KEY"))
        }
    }

    async fn issue_stt_token(&self) -> Result<String, SpeechError> {
        if self.available {
            Ok("stt-token".to_string())
        } else {
            Err(SpeechError::NotConfigured("OPENAI_API_KEY"))
        }
    }
}

// ── Harness ──

pub async fn memory_pool() -> SqlitePool {
    // A single connection that never recycles keeps the in-memory database alive
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    db::run_migrations(&pool).await.expect("migrations");
    pool
}

pub struct Harness {
    pub pool: SqlitePool,
    pub ai: Arc<FakeAi>,
    pub rooms: Arc<InMemoryRooms>,
    pub registry: SessionRegistry,
    pub uploads: tempfile::TempDir,
}

pub struct HarnessOptions {
    pub speech_available: bool,
    pub max_followups: i64,
    pub idle: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            speech_available: true,
            max_followups: 3,
            idle: Duration::from_secs(60),
        }
    }
}

impl Harness {
    pub async fn new(ai: FakeAi) -> Self {
        Self::with_options(ai, HarnessOptions::default()).await
    }

    pub async fn with_options(ai: FakeAi, options: HarnessOptions) -> Self {
        let pool = memory_pool().await;
        let uploads = tempfile::tempdir().expect("temp dir");
        let ai = Arc::new(ai);
        let rooms = Arc::new(InMemoryRooms::new());

        let engine = InterviewEngine::new(
            pool.clone(),
            ai.clone(),
            Arc::new(StubSpeech {
                available: options.speech_available,
            }),
            Arc::new(LocalObjectStorage::new(uploads.path(), "/files")),
            rooms.clone(),
            options.max_followups,
        );
        let registry = SessionRegistry::new(engine, options.idle);

        Self {
            pool,
            ai,
            rooms,
            registry,
            uploads,
        }
    }

    /// Inserts a PENDING session owned by `user_id`.
    pub async fn create_session(&self, session_id: &str, user_id: &str) -> InterviewSession {
        let profile = profile();
        db::create_session(
            &self.pool,
            &NewInterviewSession {
                id: session_id,
                user_id,
                title: "Acme interview 1",
                profile: &profile,
            },
        )
        .await
        .expect("create session")
    }

    pub async fn session(&self, session_id: &str) -> InterviewSession {
        db::get_session(&self.pool, session_id)
            .await
            .expect("query session")
            .expect("session exists")
    }

    pub async fn steps(&self, session_id: &str) -> Vec<InterviewStep> {
        db::list_steps(&self.pool, session_id).await.expect("list steps")
    }

    pub async fn try_join(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> (Member, Result<(), InterviewError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = uuid::Uuid::now_v7().to_string();
        let result = self.registry.join(session_id, user_id, &conn_id, tx).await;
        (Member { conn_id, rx }, result)
    }

    pub async fn join(&self, session_id: &str, user_id: &str) -> Member {
        let (member, result) = self.try_join(session_id, user_id).await;
        result.expect("join accepted");
        member
    }

    /// Creates a session, joins the owner and waits until the questions are stored.
    pub async fn ready_session(&self, session_id: &str) -> Member {
        self.create_session(session_id, OWNER).await;
        let mut member = self.join(session_id, OWNER).await;
        self.registry
            .start_background_setup(session_id, setup_request())
            .await;

        match member.next().await {
            ServerEvent::QuestionsReady(payload) => assert_eq!(payload.session_id, session_id),
            other => panic!("expected questions-ready, got {other:?}"),
        }
        member
    }

    /// `ready_session` followed by `ready`; returns the member and the first question.
    pub async fn started_session(&self, session_id: &str) -> (Member, InterviewStep) {
        let mut member = self.ready_session(session_id).await;
        self.registry
            .ready(session_id, &member.conn_id)
            .await
            .expect("ready accepted");
        let first = member.next_question().await;
        assert!(!first.is_follow_up);
        (member, first.step)
    }

    pub async fn submit(
        &self,
        session_id: &str,
        step_id: &str,
        answer: &str,
    ) -> Result<(), InterviewError> {
        self.registry
            .submit_answer(
                session_id,
                AnswerSubmission {
                    step_id: step_id.to_string(),
                    answer: answer.to_string(),
                    duration_sec: 30,
                },
            )
            .await
    }
}

pub fn profile() -> InterviewProfile {
    InterviewProfile {
        company: "Acme".to_string(),
        job_title: "Backend Engineer".to_string(),
        job_spec: "Rust, SQL".to_string(),
        ideal_talent: "Owns problems end to end".to_string(),
    }
}

pub fn setup_request() -> SetupRequest {
    SetupRequest {
        profile: profile(),
        cover_letter: DocumentPayload {
            filename: "cover letter.pdf".to_string(),
            bytes: b"%PDF-1.7 cover".to_vec(),
        },
        portfolio: DocumentPayload {
            filename: "portfolio.pdf".to_string(),
            bytes: b"%PDF-1.7 portfolio".to_vec(),
        },
    }
}

// ── Room member ──

/// One socket's view of the room: every event sent to it lands in `rx`.
pub struct Member {
    pub conn_id: String,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Member {
    pub async fn next(&mut self) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    pub async fn next_question(&mut self) -> NextQuestionPayload {
        match self.next().await {
            ServerEvent::NextQuestion(payload) => payload,
            other => panic!("expected next-question, got {other:?}"),
        }
    }

    pub async fn error_code(&mut self) -> String {
        match self.next().await {
            ServerEvent::Error(payload) => payload.code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    pub fn assert_quiet(&mut self) {
        if let Ok(event) = self.rx.try_recv() {
            panic!("expected no pending events, got {event:?}");
        }
    }
}
