//! # 세션 액터 레지스트리
//!
//! 세션 ID마다 작업 큐(mailbox)를 하나씩 두고, 전용 tokio 태스크가 명령을 하나씩 처리합니다.
//! 같은 세션의 작업은 절대 겹치지 않고, 다른 세션끼리는 서로 기다리지 않습니다.
//!
//! ```text
//! dispatch("s-1", Ready) ──▶ [mailbox s-1] ──▶ actor s-1 ── engine.ready()
//! dispatch("s-2", Submit) ─▶ [mailbox s-2] ──▶ actor s-2 ── engine.submit_answer()
//! ```
//!
//! 질문 준비의 긴 단계(업로드, 텍스트 추출, 질문 생성)는 별도 태스크에서 돌고,
//! 결과만 `SetupFinished`로 큐에 다시 들어옵니다. 그동안 들어온 `join-room`은 기다리지 않습니다.
//!
//! 액터는 일정 시간 명령이 없으면 종료합니다. 종료 직전 레지스트리 잠금을 잡고
//! 큐가 비었는지 다시 확인하므로, 이미 들어온 명령은 버려지지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot, Mutex};

use super::engine::{AnswerSubmission, InterviewEngine};
use crate::error::InterviewError;
use crate::models::{NewStep, SetupRequest};
use crate::services::rooms::ConnectionSender;

type Reply = oneshot::Sender<Result<(), InterviewError>>;

/// 응답을 기다리는 쪽이 받는 채널
pub type ReplyReceiver = oneshot::Receiver<Result<(), InterviewError>>;

/// 세션 액터가 처리하는 명령
pub enum SessionCommand {
    Setup(SetupRequest),
    /// 액터 밖에서 끝난 질문 준비 결과
    SetupFinished(Result<Vec<NewStep>, InterviewError>),
    Join {
        user_id: String,
        conn_id: String,
        sender: ConnectionSender,
        reply: Reply,
    },
    Ready {
        conn_id: String,
        reply: Reply,
    },
    SubmitAnswer {
        submission: AnswerSubmission,
        reply: Reply,
    },
}

impl SessionCommand {
    fn name(&self) -> &'static str {
        match self {
            SessionCommand::Setup(_) => "setup",
            SessionCommand::SetupFinished(_) => "setup-finished",
            SessionCommand::Join { .. } => "join-room",
            SessionCommand::Ready { .. } => "ready",
            SessionCommand::SubmitAnswer { .. } => "submit-answer",
        }
    }
}

struct RegistryInner {
    engine: InterviewEngine,
    mailboxes: Mutex<HashMap<String, mpsc::UnboundedSender<SessionCommand>>>,
    /// 질문 준비가 진행 중인 세션
    preparing: Mutex<HashSet<String>>,
    idle: Duration,
}

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(engine: InterviewEngine, idle: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                engine,
                mailboxes: Mutex::new(HashMap::new()),
                preparing: Mutex::new(HashSet::new()),
                idle,
            }),
        }
    }

    pub fn engine(&self) -> &InterviewEngine {
        &self.inner.engine
    }

    /// 현재 살아 있는 세션 액터 수
    pub async fn active_sessions(&self) -> usize {
        self.inner.mailboxes.lock().await.len()
    }

    /// 명령을 세션의 큐에 넣습니다. 액터가 없으면 새로 띄웁니다.
    pub async fn dispatch(&self, session_id: &str, command: SessionCommand) {
        let mut mailboxes = self.inner.mailboxes.lock().await;

        let command = match mailboxes.get(session_id) {
            Some(tx) => match tx.send(command) {
                Ok(()) => return,
                // 액터가 비정상 종료됨: 새로 띄워서 명령을 넘깁니다
                Err(mpsc::error::SendError(command)) => command,
            },
            None => command,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(command).is_err() {
            return;
        }
        mailboxes.insert(session_id.to_string(), tx);

        tracing::debug!(session_id, "Spawning session actor");
        tokio::spawn(run_actor(self.clone(), session_id.to_string(), rx));
    }

    // ── 명령 편의 함수 ──

    /// 백그라운드 준비를 예약하고 바로 반환합니다.
    pub async fn start_background_setup(&self, session_id: &str, request: SetupRequest) {
        self.dispatch(session_id, SessionCommand::Setup(request)).await;
    }

    pub async fn enqueue_join(
        &self,
        session_id: &str,
        user_id: &str,
        conn_id: &str,
        sender: ConnectionSender,
    ) -> ReplyReceiver {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            SessionCommand::Join {
                user_id: user_id.to_string(),
                conn_id: conn_id.to_string(),
                sender,
                reply,
            },
        )
        .await;
        rx
    }

    pub async fn enqueue_ready(&self, session_id: &str, conn_id: &str) -> ReplyReceiver {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            SessionCommand::Ready {
                conn_id: conn_id.to_string(),
                reply,
            },
        )
        .await;
        rx
    }

    pub async fn enqueue_submit(&self, session_id: &str, submission: AnswerSubmission) -> ReplyReceiver {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::SubmitAnswer { submission, reply })
            .await;
        rx
    }

    pub async fn join(
        &self,
        session_id: &str,
        user_id: &str,
        conn_id: &str,
        sender: ConnectionSender,
    ) -> Result<(), InterviewError> {
        wait(self.enqueue_join(session_id, user_id, conn_id, sender).await).await
    }

    pub async fn ready(&self, session_id: &str, conn_id: &str) -> Result<(), InterviewError> {
        wait(self.enqueue_ready(session_id, conn_id).await).await
    }

    pub async fn submit_answer(
        &self,
        session_id: &str,
        submission: AnswerSubmission,
    ) -> Result<(), InterviewError> {
        wait(self.enqueue_submit(session_id, submission).await).await
    }
}

/// 액터의 응답을 기다립니다. 액터가 응답 없이 사라지면 조회 실패로 취급합니다.
pub async fn wait(rx: ReplyReceiver) -> Result<(), InterviewError> {
    rx.await.unwrap_or_else(|_| {
        Err(InterviewError::SessionFetchFailed(
            "session worker stopped".to_string(),
        ))
    })
}

async fn run_actor(
    registry: SessionRegistry,
    session_id: String,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
) {
    loop {
        let command = match tokio::time::timeout(registry.inner.idle, rx.recv()).await {
            Ok(Some(command)) => command,
            Ok(None) => break,
            Err(_) => {
                // 잠금 안에서 다시 확인해야 dispatch와 엇갈리지 않습니다
                let mut mailboxes = registry.inner.mailboxes.lock().await;
                match rx.try_recv() {
                    Ok(command) => command,
                    Err(_) => {
                        mailboxes.remove(&session_id);
                        tracing::debug!(session_id = %session_id, "Session actor retired after idle timeout");
                        break;
                    }
                }
            }
        };

        tracing::debug!(session_id = %session_id, command = command.name(), "Handling session command");
        handle(&registry, &session_id, command).await;
    }
}

async fn handle(registry: &SessionRegistry, session_id: &str, command: SessionCommand) {
    let engine = &registry.inner.engine;
    match command {
        SessionCommand::Setup(request) => match engine.needs_setup(session_id).await {
            Ok(true) => spawn_preparation(registry, session_id, request).await,
            Ok(false) => {}
            Err(e) => tracing::error!(session_id, error = %e, "Could not start interview setup"),
        },
        SessionCommand::SetupFinished(prepared) => {
            registry.inner.preparing.lock().await.remove(session_id);
            // 실패는 엔진이 로그와 방 이벤트로 이미 알렸습니다
            let _ = engine.finish_setup(session_id, prepared).await;
        }
        SessionCommand::Join {
            user_id,
            conn_id,
            sender,
            reply,
        } => {
            let _ = reply.send(engine.join(session_id, &user_id, &conn_id, sender).await);
        }
        SessionCommand::Ready { conn_id, reply } => {
            let _ = reply.send(engine.ready(session_id, &conn_id).await);
        }
        SessionCommand::SubmitAnswer { submission, reply } => {
            let _ = reply.send(engine.submit_answer(session_id, submission).await);
        }
    }
}

/// 질문 준비의 긴 단계를 별도 태스크로 돌리고, 끝나면 결과를 세션 큐에 넣습니다.
/// 이미 준비 중인 세션이면 아무것도 하지 않습니다.
async fn spawn_preparation(registry: &SessionRegistry, session_id: &str, request: SetupRequest) {
    if !registry.inner.preparing.lock().await.insert(session_id.to_string()) {
        tracing::warn!(session_id, "Setup skipped, questions are already being prepared");
        return;
    }

    tokio::spawn(preparation_task(
        registry.clone(),
        session_id.to_string(),
        request,
    ));
}

// dispatch → 액터 → spawn_preparation → dispatch 순환이 있어 박싱한 타입으로 끊습니다
fn preparation_task(
    registry: SessionRegistry,
    session_id: String,
    request: SetupRequest,
) -> BoxFuture<'static, ()> {
    async move {
        let prepared = registry
            .inner
            .engine
            .prepare_questions(&session_id, &request)
            .await;
        registry
            .dispatch(&session_id, SessionCommand::SetupFinished(prepared))
            .await;
    }
    .boxed()
}
