//! # 서비스 계층
//!
//! 라우트 핸들러와 DB 계층 사이의 도메인 로직과 외부 협력자 경계입니다.
//!
//! - `ai_client`: 질문 생성/평가/꼬리 질문을 맡는 AI 서버 클라이언트
//! - `speech`: 질문 음성 합성과 STT 토큰 발급
//! - `storage`: 업로드 문서 저장
//! - `rooms`: 세션 방 멤버십과 이벤트 브로드캐스트
//! - `interview`: 면접 상태 머신과 세션 액터

pub mod ai_client;
pub mod interview;
pub mod rooms;
pub mod speech;
pub mod storage;
