//! Answer, source, and batch result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::QuestionType;

/// How a cited chunk supports the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// The claim appears (nearly) verbatim in the chunk
    Exact,
    /// Substantial lexical overlap without a verbatim span
    Paraphrase,
    /// Neither; the chunk supports the answer only by inference
    Inference,
}

/// Aggregate verification outcome of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Partial,
    Unverified,
}

/// Evidence attached to an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    /// Span of the chunk's text
    pub exact_quote: String,
    /// Full chunk text
    pub context: String,
    pub page_number: Option<u32>,
    /// Retrieval similarity
    pub relevance_score: f32,
    pub match_type: MatchType,
    /// Per-source confidence (0.0-1.0)
    pub confidence_score: f32,
}

/// Answer to one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    pub reasoning_steps: Vec<String>,
    /// Descending confidence, ties by retrieval rank
    pub sources: Vec<Source>,
    pub confidence_score: f32,
    pub verification_status: VerificationStatus,
    /// Seconds
    pub processing_time: f64,
    pub model_used: String,
}

/// A question that did not produce a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFailure {
    pub question_id: String,
    /// Stable error tag (see `Error::kind`)
    pub error_kind: String,
    pub message: String,
}

/// Result of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBatch {
    pub batch_id: Uuid,
    pub total_questions: usize,
    pub completed: usize,
    pub failed: usize,
    /// Submission order; failed questions are absent
    pub results: Vec<AnswerResult>,
    pub failures: Vec<QuestionFailure>,
    /// Wall-clock seconds
    pub total_processing_time: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
