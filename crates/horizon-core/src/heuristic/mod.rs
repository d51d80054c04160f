//! Rule-based interim planner.
//!
//! Produces the provisional result shown before (or instead of) a generated
//! roadmap: a top-3 priority list and a current-month task list derived from
//! the diagnosis answers by an ordered table of (predicate, recommendation)
//! pairs. Pure and total: every branch has a fallback and no input can fail.

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::Answers;

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// One priority rule: a predicate over the answer map and the recommendation
/// it contributes when matched.
pub struct PriorityRule {
    pub matches: fn(&Answers) -> bool,
    pub recommendation: &'static str,
}

/// Priority rules, evaluated in declaration order.
pub const PRIORITY_RULES: &[PriorityRule] = &[
    PriorityRule {
        matches: |a: &Answers| answer(a, "pension_ready") == Some("모른다"),
        recommendation: "국민연금/퇴직연금 예상 수령액 조회하기",
    },
    PriorityRule {
        matches: |a: &Answers| answer(a, "debt").is_some_and(|d| d.contains("부담")),
        recommendation: "부채(대출) 상환 우선순위/금리 점검하기",
    },
    PriorityRule {
        matches: |a: &Answers| answer(a, "monthly_spend") == Some("400 이상"),
        recommendation: "월 지출 상한선 설정 + 고정비 다이어트 시작",
    },
    PriorityRule {
        matches: |a: &Answers| answer(a, "health") == Some("부족"),
        recommendation: "보험/건강 보장 공백 점검(실손/중대질병/치매)",
    },
    PriorityRule {
        matches: |a: &Answers| answer(a, "job_plan") == Some("없음"),
        recommendation: "은퇴 후 소득원(파트/자격/프로젝트) 옵션 3개 리스트업",
    },
];

/// Generic recommendations appended after the rule hits so the result is
/// never shorter than three entries.
pub const FALLBACK_PRIORITIES: [&str; 3] = [
    "현금흐름(수입/지출) 표 만들기",
    "은퇴 시점/목표 생활비를 수치로 정리하기",
    "연금·보험·부채·자산 문서 한 폴더에 모으기",
];

const PENSION_LOOKUP_TASK: &str = "국민연금 예상연금액 조회 + 캡처 저장";
const SPEND_BREAKDOWN_TASK: &str = "최근 30일 지출을 5개 카테고리로 분류(식비/주거/교통/통신/기타)";
const DEBT_LIST_TASK: &str = "대출 목록 정리(금리/잔액/상환방식) → 우선순위 표시";
const GENERIC_SUMMARY_TASK: &str = "연금/퇴직금/자산 현황을 한 장 요약으로 정리";

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Top-3 priority list for an answer set.
///
/// Rule hits in rule order, then the fallback sequence, deduplicated
/// preserving first occurrence and truncated to three.
pub fn priorities(answers: &Answers) -> Vec<String> {
    let mut items: Vec<&'static str> = PRIORITY_RULES
        .iter()
        .filter(|rule| (rule.matches)(answers))
        .map(|rule| rule.recommendation)
        .collect();
    items.extend_from_slice(&FALLBACK_PRIORITIES);
    dedupe_truncate(items, 3)
}

/// Task list for the current month.
///
/// One pension-lookup task when the pension amount is unknown, one
/// unconditional spend-categorization task, one debt-listing task when debt
/// is declared, and one task selected by the declared priority answer (with a
/// generic summary task as the default branch). Deduplicated and truncated to
/// three.
pub fn current_month_tasks(answers: &Answers) -> Vec<String> {
    let mut tasks: Vec<&'static str> = Vec::with_capacity(4);

    if answer(answers, "pension_ready") == Some("모른다") {
        tasks.push(PENSION_LOOKUP_TASK);
    }
    tasks.push(SPEND_BREAKDOWN_TASK);
    if answer(answers, "debt").is_some_and(|d| d != "없음") {
        tasks.push(DEBT_LIST_TASK);
    }
    tasks.push(priority_task(answer(answers, "priority")));

    dedupe_truncate(tasks, 3)
}

/// Map the declared priority answer onto one concrete task.
fn priority_task(priority: Option<&str>) -> &'static str {
    match priority {
        Some("보험/건강") => "보험 증권/내역 모아서 ‘중복/공백’ 체크",
        Some("부채 정리") => "상환 계획 초안(월 상환 가능액) 1장 만들기",
        Some("지출 관리") => "고정비 3개만 줄이는 액션(통신/구독/보험료) 설정",
        Some("은퇴 후 일") => "가능한 일/재능/경험 10개 적고 상위 3개 선택",
        _ => GENERIC_SUMMARY_TASK,
    }
}

// ---------------------------------------------------------------------------
// Interim report
// ---------------------------------------------------------------------------

/// The rule-based result rendered before a roadmap has been generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterimReport {
    pub summary: String,
    pub top_priorities: Vec<String>,
    pub current_tasks: Vec<String>,
}

/// One-line diagnosis summary; unanswered fields show as "미입력".
pub fn summary_line(answers: &Answers) -> String {
    let field = |id: &str| answer(answers, id).unwrap_or("미입력");
    format!(
        "은퇴 시점: {} · 월지출: {} · 연금 파악: {} · 부채: {} · 우선순위: {}",
        field("retire_year"),
        field("monthly_spend"),
        field("pension_ready"),
        field("debt"),
        field("priority"),
    )
}

/// Bundle the full interim result for an answer set.
pub fn interim_report(answers: &Answers) -> InterimReport {
    InterimReport {
        summary: summary_line(answers),
        top_priorities: priorities(answers),
        current_tasks: current_month_tasks(answers),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn answer<'a>(answers: &'a Answers, id: &str) -> Option<&'a str> {
    answers.get(id).map(String::as_str)
}

fn dedupe_truncate(items: Vec<&'static str>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(*item))
        .take(limit)
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
