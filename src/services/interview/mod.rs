//! # 면접 세션 오케스트레이션
//!
//! - `cursor`: 스텝 목록에서 현재 질문을 계산하는 순수 함수
//! - `engine`: 상태 머신 (준비, 시작, 답변, 꼬리 질문, 종료)
//! - `registry`: 세션마다 하나씩 도는 액터와 작업 큐

pub mod cursor;
pub mod engine;
pub mod registry;

pub use engine::{AnswerSubmission, InterviewEngine};
pub use registry::{SessionCommand, SessionRegistry};
