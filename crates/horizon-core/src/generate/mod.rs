//! Roadmap generation: prompt construction and the generation-service seam.
//!
//! The [`Generator`] trait is the adapter interface for the external
//! text-generation service; [`OpenAiGenerator`](openai::OpenAiGenerator) is
//! the production implementation. [`generate_roadmap`] glues prompt, call,
//! and boundary validation together and is where untrusted output is turned
//! into a typed [`Roadmap`] or a typed failure.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::Answers;
use crate::roadmap::{self, Roadmap, RoadmapParseError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Errors from the generation client.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The generation service is unreachable or not configured.
    #[error("generation backend is not configured: {0}")]
    Config(String),

    /// The service answered, but its payload failed parsing or validation.
    /// The raw text is retained for diagnostics.
    #[error("generation backend returned an unusable payload: {source}")]
    Format {
        #[source]
        source: RoadmapParseError,
        raw: String,
    },

    /// Any other call failure: transport error, timeout, non-2xx status.
    #[error("generation request failed: {0}")]
    Upstream(String),
}

/// Adapter interface for the external text-generation service.
///
/// Implementors take one prompt and return the raw response text. The trait
/// is object-safe so services can hold a `Box<dyn Generator>` or
/// `Arc<dyn Generator>` and tests can substitute scripted responses.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name for this backend (e.g. "openai").
    fn name(&self) -> &str;

    /// Send one prompt and return the raw response text.
    ///
    /// Implementations must bound the call with a timeout and surface expiry
    /// as [`GenerateError::Upstream`].
    async fn complete(&self, prompt: &str) -> Result<String, GenerateError>;
}

// Compile-time assertion: Generator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Generator) {}
};

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// JSON schema reference included in the prompt.
const SCHEMA_REFERENCE: &str = r#"출력 JSON 스키마:
{
  "title": "string",
  "summary": "string",
  "top_priorities": ["string", "... 최대 5개"],
  "months": [
    {
      "month": 1,
      "goal": "string",
      "tasks": ["string", "string", "string"],
      "caution": "string"
    }
    ... month 12까지
  ]
}"#;

/// Build the generation prompt for an answer set.
///
/// Fixes the output contract (Korean, strict JSON only, the exact roadmap
/// schema) and embeds the serialized answers as context.
pub fn build_prompt(answers: &Answers) -> String {
    let serialized = serde_json::Value::Object(
        answers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    );

    let mut prompt = String::with_capacity(1024);
    prompt.push_str("너는 50~60대 직장인을 위한 은퇴 준비 코치야.\n");
    prompt.push_str("사용자의 진단 답변을 바탕으로 \"12개월 실행 로드맵\"을 만들어줘.\n\n");
    prompt.push_str("요구사항:\n");
    prompt.push_str("- 반드시 JSON만 출력\n");
    prompt.push_str("- 한국어로 작성\n");
    prompt.push_str("- 12개월(1~12월) 각각에: 목표, 해야할 일 3개(체크리스트), 주의사항 1개\n");
    prompt.push_str("- 마지막에 전체 우선순위 TOP5 (짧은 문장)\n\n");
    prompt.push_str(SCHEMA_REFERENCE);
    prompt.push_str("\n\n사용자 답변:\n");
    prompt.push_str(&format!("{serialized:#}"));
    prompt.push('\n');
    prompt
}

// ---------------------------------------------------------------------------
// Generation flow
// ---------------------------------------------------------------------------

/// Generate a validated roadmap for an answer set.
///
/// Builds the prompt, invokes the generator, and parses the raw response
/// through the roadmap validation boundary. A response that is not valid
/// JSON, or that is JSON of the wrong shape, yields [`GenerateError::Format`]
/// with the raw text retained; a partially-accepted roadmap is never
/// returned.
pub async fn generate_roadmap(
    generator: &dyn Generator,
    answers: &Answers,
) -> Result<Roadmap, GenerateError> {
    let prompt = build_prompt(answers);
    tracing::debug!(backend = generator.name(), "requesting roadmap generation");

    let raw = generator.complete(&prompt).await?;

    match roadmap::parse_roadmap(&raw) {
        Ok(roadmap) => Ok(roadmap),
        Err(source) => {
            tracing::warn!(backend = generator.name(), error = %source, "unusable generation payload");
            Err(GenerateError::Format { source, raw })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
