//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `interview`: 면접 세션과 상태
//! - `step`: 질문/답변/평가 스텝
//! - `ws`: 웹소켓으로 주고받는 이벤트
//!
//! `pub use X::*;`로 재공개하여 `crate::models::InterviewStep`처럼 짧게 접근합니다.

pub mod interview;
pub mod step;
pub mod ws;

pub use interview::*;
pub use step::*;
pub use ws::*;
