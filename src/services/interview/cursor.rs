//! 스텝 목록에서 "지금 어느 질문 차례인가"를 계산하는 순수 함수들
//!
//! 세션은 메인 질문 인덱스만 저장하고, 현재 스텝은 매번 스텝 목록에서 다시 계산합니다.
//!
//! ```text
//! index = 1
//! main[0] q1 ✔ ── q1-fu1 ✔
//! main[1] q2 ✔ ── q2-fu1 ✔ ── q2-fu2 ·   ← Awaiting(q2-fu2)
//! main[2] q3 ·
//! ```

use crate::models::{InterviewStep, TailDecision};

/// 메인 질문 인덱스가 가리키는 분기의 상태
#[derive(Debug, Clone, Copy)]
pub enum Cursor<'a> {
    /// 답변(또는 평가)을 기다리는 스텝
    Awaiting(&'a InterviewStep),
    /// 분기의 마지막 스텝이 평가까지 끝났지만 다음 단계로 넘어가지 못함
    Evaluated(&'a InterviewStep),
    /// 인덱스가 메인 질문 수를 벗어남
    Exhausted,
}

/// 메인 스텝들 (생성 순서)
pub fn main_steps(steps: &[InterviewStep]) -> Vec<&InterviewStep> {
    steps.iter().filter(|s| s.is_main()).collect()
}

/// 메인 스텝 하나에 달린 꼬리 질문 수
pub fn followup_count(root_id: &str, steps: &[InterviewStep]) -> i64 {
    steps
        .iter()
        .filter(|s| s.parent_step_id.as_deref() == Some(root_id))
        .count() as i64
}

/// `index`번째 메인 질문 분기의 현재 위치를 찾습니다.
///
/// `steps`는 `seq` 순서여야 합니다. 꼬리 질문은 앞 스텝의 평가가 끝난 뒤에만 생기므로
/// 분기의 마지막 스텝이 곧 현재 스텝입니다.
pub fn locate(index: i64, steps: &[InterviewStep]) -> Cursor<'_> {
    let Some(main) = usize::try_from(index)
        .ok()
        .and_then(|i| main_steps(steps).get(i).copied())
    else {
        return Cursor::Exhausted;
    };

    let last = steps
        .iter()
        .filter(|s| s.parent_step_id.as_deref() == Some(main.id.as_str()))
        .last()
        .unwrap_or(main);

    if last.is_evaluated() {
        Cursor::Evaluated(last)
    } else {
        Cursor::Awaiting(last)
    }
}

/// 평가자의 결정에 꼬리 질문 상한을 적용합니다. 상한에 닿은 CREATE는 SKIP이 됩니다.
pub fn effective_decision(decision: TailDecision, followups: i64, max_followups: i64) -> TailDecision {
    match decision {
        TailDecision::Create if followups < max_followups => TailDecision::Create,
        _ => TailDecision::Skip,
    }
}

/// n번째(1부터) 꼬리 질문의 AI ID: 예: `q2-fu1`
pub fn followup_ai_id(root_ai_id: &str, n: i64) -> String {
    format!("{}-fu{}", root_ai_id, n)
}

/// AI가 고른 집중 기준을 메인 질문의 기준 안으로 좁힙니다.
/// 남는 것이 없으면 메인 질문의 기준을 그대로 씁니다.
pub fn narrow_criteria(focus: &[String], parent: &[String]) -> Vec<String> {
    let narrowed: Vec<String> = focus
        .iter()
        .filter(|c| parent.contains(c))
        .cloned()
        .collect();

    if narrowed.is_empty() {
        parent.to_vec()
    } else {
        narrowed
    }
}

/// 재접속 스냅샷에 들어가는 답변 완료 스텝들
pub fn answered_steps(steps: &[InterviewStep]) -> Vec<InterviewStep> {
    steps.iter().filter(|s| s.is_evaluated()).cloned().collect()
}
