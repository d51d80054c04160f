//! The fixed diagnosis question catalog and answer-set validation.
//!
//! The catalog is static: ten single-select questions, fixed at build time.
//! Answer sets are validated once at submission; downstream consumers treat
//! stored answers as already valid.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// A submitted answer map: question id -> selected option.
pub type Answers = BTreeMap<String, String>;

/// One diagnosis question with its ordered option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Stable identifier used as the answer-map key.
    pub id: &'static str,
    /// Prompt shown to the user.
    pub prompt: &'static str,
    /// Allowed options, in display order.
    pub options: &'static [&'static str],
}

/// The full question catalog, in display order.
pub const QUESTIONS: &[Question] = &[
    Question {
        id: "retire_year",
        prompt: "은퇴 예정 시점은 언제인가요?",
        options: &["1년 이내", "1~3년", "3~5년", "5년 이상"],
    },
    Question {
        id: "age_group",
        prompt: "연령대는 어떻게 되세요?",
        options: &["50~54", "55~59", "60~64", "65+"],
    },
    Question {
        id: "monthly_spend",
        prompt: "현재 월 평균 지출은 어느 정도인가요?",
        options: &["200만원 미만", "200~300", "300~400", "400 이상"],
    },
    Question {
        id: "pension_ready",
        prompt: "국민연금/퇴직연금 예상 수령액을 알고 있나요?",
        options: &["정확히 안다", "대략 안다", "모른다"],
    },
    Question {
        id: "debt",
        prompt: "현재 부채(대출)가 있나요?",
        options: &["없음", "있음(감당 가능)", "있음(부담 큼)"],
    },
    Question {
        id: "house",
        prompt: "주거 형태는?",
        options: &["자가", "전세", "월세", "기타"],
    },
    Question {
        id: "health",
        prompt: "건강/보험 준비는?",
        options: &["충분", "보통", "부족"],
    },
    Question {
        id: "job_plan",
        prompt: "은퇴 후 수입 계획이 있나요?",
        options: &["없음", "부분적으로 있음", "구체적으로 있음"],
    },
    Question {
        id: "family_support",
        prompt: "자녀/가족 지원 부담이 있나요?",
        options: &["없음", "가끔", "지속적으로 큼"],
    },
    Question {
        id: "priority",
        prompt: "가장 먼저 해결하고 싶은 분야는?",
        options: &["연금/현금흐름", "지출 관리", "부채 정리", "보험/건강", "은퇴 후 일"],
    },
];

/// Look up a question by id.
pub fn question(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Errors from validating a submitted answer map.
#[derive(Debug, Error)]
pub enum AnswerValidationError {
    #[error("unknown question id {0:?}")]
    UnknownQuestion(String),

    #[error("option {value:?} is not allowed for question {question:?}")]
    InvalidOption { question: String, value: String },
}

/// Validate a submitted answer map against the catalog.
///
/// Every key must be a known question id and every value one of that
/// question's allowed options. Missing questions are permitted: the heuristic
/// rules treat an unset field as "no match" rather than an error.
pub fn validate_answers(answers: &Answers) -> Result<(), AnswerValidationError> {
    for (id, value) in answers {
        let question = question(id)
            .ok_or_else(|| AnswerValidationError::UnknownQuestion(id.clone()))?;
        if !question.options.contains(&value.as_str()) {
            return Err(AnswerValidationError::InvalidOption {
                question: id.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}
