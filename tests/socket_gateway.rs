//! Socket gateway and HTTP surface tests: room membership, reconnect snapshots,
//! rejections delivered to the requester, and handshake authentication.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::util::ServiceExt;

use common::*;
use mockview::middleware::auth::create_access_token;
use mockview::models::*;
use mockview::routes::{AppState, SocketConnection};
use mockview::services::ai_client::AiCategory;
use mockview::services::interview::registry::wait;
use mockview::services::interview::AnswerSubmission;
use mockview::services::rooms::RoomBroadcaster;

fn socket(h: &Harness, user_id: &str) -> (SocketConnection, Member) {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = SocketConnection::new(h.registry.clone(), user_id.to_string(), tx);
    let member = Member {
        conn_id: conn.conn_id().to_string(),
        rx,
    };
    (conn, member)
}

fn event(kind: &str, payload: Value) -> String {
    json!({ "type": kind, "payload": payload }).to_string()
}

// ── Reconnect ──

#[tokio::test]
async fn reconnect_replays_snapshot_to_the_new_socket_only() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let (mut original, first) = h.started_session("s-d").await;

    h.submit("s-d", &first.id, "answer one").await.unwrap();
    let second = original.next_question().await;

    let mut rejoined = h.join("s-d", OWNER).await;
    match rejoined.next().await {
        ServerEvent::QuestionsReady(snapshot) => {
            assert_eq!(snapshot.session_id, "s-d");
            assert!(snapshot.elapsed_sec >= 0);
            assert_eq!(snapshot.answered_steps.len(), 1);
            assert_eq!(snapshot.answered_steps[0].id, first.id);
            assert_eq!(snapshot.current_step.unwrap().id, second.step.id);
        }
        other => panic!("expected questions-ready snapshot, got {other:?}"),
    }

    // ready from the rejoined socket re-sends the current question to it alone
    h.registry.ready("s-d", &rejoined.conn_id).await.unwrap();
    let resent = rejoined.next_question().await;
    assert_eq!(resent.step.id, second.step.id);
    original.assert_quiet();

    // Re-sending does not move the session
    let session = h.session("s-d").await;
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.current_question_index, 1);
}

#[tokio::test]
async fn reconnect_during_evaluation_resumes_at_the_next_question() {
    let ai = FakeAi::new(three_questions()).with_evaluation_delay(Duration::from_millis(100));
    let h = Harness::new(ai).await;
    let (original, first) = h.started_session("s-flap").await;

    let pending = h
        .registry
        .enqueue_submit(
            "s-flap",
            AnswerSubmission {
                step_id: first.id.clone(),
                answer: "answer one".to_string(),
                duration_sec: 20,
            },
        )
        .await;

    // The socket drops while the answer is being evaluated
    h.rooms.leave(&original.conn_id);
    drop(original);

    let mut rejoined = h.join("s-flap", OWNER).await;
    match rejoined.next().await {
        ServerEvent::QuestionsReady(snapshot) => {
            assert_eq!(snapshot.answered_steps.len(), 1);
            assert_eq!(snapshot.answered_steps[0].id, first.id);
            assert_eq!(snapshot.current_step.unwrap().ai_question_id, "q2");
        }
        other => panic!("expected questions-ready snapshot, got {other:?}"),
    }
    assert_eq!(wait(pending).await, Ok(()));

    h.registry.ready("s-flap", &rejoined.conn_id).await.unwrap();
    let resent = rejoined.next_question().await;
    assert_eq!(resent.step.ai_question_id, "q2");
    rejoined.assert_quiet();
    assert_eq!(h.session("s-flap").await.current_question_index, 1);
}

#[tokio::test]
async fn joining_a_finished_session_reports_completion() {
    let h = Harness::new(FakeAi::new(vec![question("only", AiCategory::Technical, &["clarity"])])).await;
    let (mut member, first) = h.started_session("s-done").await;
    h.submit("s-done", &first.id, "answer").await.unwrap();
    assert!(matches!(member.next().await, ServerEvent::InterviewFinished(_)));

    let mut late = h.join("s-done", OWNER).await;
    match late.next().await {
        ServerEvent::QuestionsReady(snapshot) => {
            assert_eq!(snapshot.answered_steps.len(), 1);
            assert!(snapshot.current_step.is_none());
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert!(matches!(late.next().await, ServerEvent::InterviewFinished(_)));

    h.registry.ready("s-done", &late.conn_id).await.unwrap();
    assert!(matches!(late.next().await, ServerEvent::InterviewFinished(_)));
    member.assert_quiet();
}

// ── Socket connection ──

#[tokio::test]
async fn malformed_frames_are_rejected() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let (mut conn, mut member) = socket(&h, OWNER);

    conn.handle_text("not json").await;
    assert_eq!(member.error_code().await, "INVALID_MESSAGE");

    conn.handle_text(&event("submit-answer", json!({ "stepId": "x" }))).await;
    assert_eq!(member.error_code().await, "INVALID_MESSAGE");
}

#[tokio::test]
async fn commands_require_a_joined_room() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    h.ready_session("s-room").await;
    let (mut conn, mut member) = socket(&h, OWNER);

    conn.handle_text(&event("ready", json!({ "sessionId": "s-room" }))).await;
    assert_eq!(member.error_code().await, "ROOM_NOT_JOINED");

    conn.handle_text(&event(
        "submit-answer",
        json!({ "stepId": "x", "answer": "a", "duration": 1 }),
    ))
    .await;
    assert_eq!(member.error_code().await, "ROOM_NOT_JOINED");

    // Nothing was started
    assert_eq!(h.session("s-room").await.status, SessionStatus::Ready);
}

#[tokio::test]
async fn foreign_and_unknown_sessions_cannot_be_joined() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    h.ready_session("s-private").await;

    let (mut conn, mut member) = socket(&h, STRANGER);
    conn.handle_text(&event("join-room", json!({ "sessionId": "s-private" }))).await;
    assert_eq!(member.error_code().await, "ROOM_ACCESS_DENIED");
    assert!(conn.joined_room().is_none());
    assert_eq!(h.rooms.member_count("s-private"), 1);

    conn.handle_text(&event("join-room", json!({ "sessionId": "missing" }))).await;
    assert_eq!(member.error_code().await, "SESSION_NOT_FOUND");
    assert!(conn.joined_room().is_none());
}

#[tokio::test]
async fn socket_drives_an_interview() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let mut observer = h.ready_session("s-sock").await;
    let (mut conn, mut member) = socket(&h, OWNER);

    conn.handle_text(&event("join-room", json!({ "sessionId": "s-sock" }))).await;
    assert_eq!(conn.joined_room(), Some("s-sock"));
    assert!(matches!(member.next().await, ServerEvent::QuestionsReady(_)));

    // ready naming another session is refused
    conn.handle_text(&event("ready", json!({ "sessionId": "s-other" }))).await;
    assert_eq!(member.error_code().await, "ROOM_NOT_JOINED");

    conn.handle_text(&event("ready", json!({ "sessionId": "s-sock" }))).await;
    let first = member.next_question().await;
    assert_eq!(observer.next_question().await.step.id, first.step.id);

    conn.handle_text(&event(
        "submit-answer",
        json!({ "stepId": first.step.id, "answer": "over the socket", "duration": 12 }),
    ))
    .await;
    let second = member.next_question().await;
    assert_eq!(observer.next_question().await.step.id, second.step.id);

    let stored = &h.steps("s-sock").await[0];
    assert_eq!(stored.answer.as_deref(), Some("over the socket"));
    assert_eq!(stored.answer_duration_sec, Some(12));

    // A duplicate is reported to this socket and nobody else
    conn.handle_text(&event(
        "submit-answer",
        json!({ "stepId": first.step.id, "answer": "again", "duration": 3 }),
    ))
    .await;
    assert_eq!(member.error_code().await, "ANSWER_ALREADY_SUBMITTED");
    tokio::time::sleep(Duration::from_millis(50)).await;
    observer.assert_quiet();
}

#[tokio::test]
async fn disconnect_leaves_the_room_but_keeps_the_session() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let (mut conn, mut member) = socket(&h, OWNER);
    h.create_session("s-drop", OWNER).await;

    conn.handle_text(&event("join-room", json!({ "sessionId": "s-drop" }))).await;
    assert_eq!(h.rooms.member_count("s-drop"), 1);

    conn.disconnect();
    assert_eq!(h.rooms.member_count("s-drop"), 0);
    assert_eq!(h.session("s-drop").await.status, SessionStatus::Pending);

    // Setup still completes without listeners
    h.registry.start_background_setup("s-drop", setup_request()).await;
    for _ in 0..100 {
        if h.session("s-drop").await.status == SessionStatus::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.session("s-drop").await.status, SessionStatus::Ready);
    member.assert_quiet();
}

// ── HTTP ──

fn app(h: &Harness) -> axum::Router {
    mockview::build_router(AppState {
        pool: h.pool.clone(),
        jwt_secret: JWT_SECRET.to_string(),
        registry: h.registry.clone(),
    })
}

fn bearer(user_id: &str) -> String {
    format!("Bearer {}", create_access_token(user_id, JWT_SECRET).unwrap())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const BOUNDARY: &str = "mockview-test-boundary";

fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, content_type) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n%PDF-1.7 test\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn create_request(user_id: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/interviews")
        .header(header::AUTHORIZATION, bearer(user_id))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const PROFILE_FIELDS: [(&str, &str); 4] = [
    ("company", "Acme"),
    ("jobTitle", "Backend Engineer"),
    ("jobSpec", "Rust"),
    ("idealTalent", "Curious"),
];

const PDFS: [(&str, &str, &str); 2] = [
    ("coverLetter", "cover.pdf", "application/pdf"),
    ("portfolio", "portfolio.pdf", "application/pdf"),
];

#[tokio::test]
async fn health_endpoint_is_public() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let response = app(&h)
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn socket_handshake_requires_a_valid_token() {
    let h = Harness::new(FakeAi::new(three_questions())).await;

    let response = app(&h)
        .oneshot(Request::builder().uri("/api/v1/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "missing_token");

    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/api/v1/ws?token=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_token");

    let forged = create_access_token(OWNER, "some-other-secret").unwrap();
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/ws?token={forged}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A valid token gets past authentication; the plain request then fails the upgrade
    let token = create_access_token(OWNER, JWT_SECRET).unwrap();
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/ws?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_interview_starts_background_setup() {
    let h = Harness::new(FakeAi::new(three_questions())).await;

    let mut fields = PROFILE_FIELDS.to_vec();
    fields.push(("sessionId", "s-http"));
    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&fields, &PDFS)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["sessionId"], "s-http");

    for _ in 0..100 {
        if h.session("s-http").await.status == SessionStatus::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let session = h.session("s-http").await;
    assert_eq!(session.status, SessionStatus::Ready);
    assert_eq!(session.title, "Acme interview 1");
    assert_eq!(session.user_id, OWNER);
    assert_eq!(h.steps("s-http").await.len(), 3);

    // Uploaded PDFs land in the storage root
    let stored = std::fs::read_dir(h.uploads.path()).unwrap().count();
    assert_eq!(stored, 2);

    // Reusing the id is refused; a generated id gets the next title number
    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&fields, &PDFS)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&PROFILE_FIELDS, &PDFS)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["sessionId"].as_str().unwrap().to_string();
    assert_eq!(h.session(&id).await.title, "Acme interview 2");
}

#[tokio::test]
async fn create_interview_validates_the_form() {
    let h = Harness::new(FakeAi::new(three_questions())).await;

    let word_file = [
        ("coverLetter", "cover.docx", "application/msword"),
        ("portfolio", "portfolio.pdf", "application/pdf"),
    ];
    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&PROFILE_FIELDS, &word_file)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&PROFILE_FIELDS[1..], &PDFS)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&h)
        .oneshot(create_request(OWNER, multipart(&PROFILE_FIELDS, &PDFS[..1])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_session_id_must_be_a_plain_token() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    let parent = h.uploads.path().parent().unwrap().to_path_buf();
    let escape = format!("../escape-{}", std::process::id());

    for id in [escape.as_str(), "a/b", "s.1"] {
        let mut fields = PROFILE_FIELDS.to_vec();
        fields.push(("sessionId", id));
        let response = app(&h)
            .oneshot(create_request(OWNER, multipart(&fields, &PDFS)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "sessionId {id:?}");
    }

    // Give a wrongly started setup time to write, then check nothing landed anywhere
    tokio::time::sleep(Duration::from_millis(50)).await;
    let prefix = format!("escape-{}", std::process::id());
    let escaped: Vec<_> = std::fs::read_dir(&parent)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .collect();
    assert!(escaped.is_empty());
    assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn interview_is_readable_by_its_owner_only() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    h.ready_session("s-read").await;

    let get = |user: &str, id: &str| {
        Request::builder()
            .uri(format!("/api/v1/interviews/{id}"))
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap()
    };

    let response = app(&h).oneshot(get(OWNER, "s-read")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session"]["status"], "READY");
    assert_eq!(body["steps"].as_array().unwrap().len(), 3);
    assert_eq!(body["steps"][0]["aiQuestionId"], "q1");

    let response = app(&h).oneshot(get(STRANGER, "s-read")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&h).oneshot(get(OWNER, "missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stt_token_is_issued_to_the_owner() {
    let h = Harness::new(FakeAi::new(three_questions())).await;
    h.ready_session("s-stt").await;

    let get = |user: &str| {
        Request::builder()
            .uri("/api/v1/interviews/s-stt/stt-token")
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap()
    };

    let response = app(&h).oneshot(get(OWNER)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["value"], "stt-token");

    let response = app(&h).oneshot(get(STRANGER)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stt_token_failure_is_an_internal_error() {
    let options = HarnessOptions {
        speech_available: false,
        ..HarnessOptions::default()
    };
    let h = Harness::with_options(FakeAi::new(three_questions()), options).await;
    h.create_session("s-nostt", OWNER).await;

    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/api/v1/interviews/s-nostt/stt-token")
                .header(header::AUTHORIZATION, bearer(OWNER))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "internal_error");
}
