//! Typed answer synthesis from retrieved evidence
//!
//! The model is asked for a JSON object. Parsing is strict about the
//! presence of an object and lenient about its fields: missing fields
//! default to empty values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::retrieval::RetrievedChunk;
use crate::types::{Question, QuestionOption, QuestionType};

use super::citation::{chunk_markers, cited_numbers, extract_reasoning_steps, resolve_references};
use super::prompt::PromptBuilder;

static ANSWER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:answer|cevap)\s*:\s*\(?([A-Za-z0-9]+)\b").expect("Invalid regex")
});

const TRUE_WORDS: &[&str] = &["true", "yes", "correct", "doğru", "dogru", "evet"];
const FALSE_WORDS: &[&str] = &["false", "no", "incorrect", "wrong", "yanlış", "yanlis", "hayır", "hayir"];

/// Answer shape per question type
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizedAnswer {
    OpenEnded {
        answer: String,
        reasoning_steps: Vec<String>,
    },
    MultipleChoice {
        answer: String,
        option: QuestionOption,
        reasoning_steps: Vec<String>,
    },
    TrueFalse {
        verdict: bool,
        justification: String,
        /// Justification, or the statement itself when none was given
        claim: String,
        reasoning_steps: Vec<String>,
    },
    ShortAnswer {
        answer: String,
        reasoning_steps: Vec<String>,
    },
}

impl SynthesizedAnswer {
    /// Text reported as the answer
    pub fn answer_text(&self) -> String {
        match self {
            Self::OpenEnded { answer, .. } | Self::ShortAnswer { answer, .. } => answer.clone(),
            Self::MultipleChoice { answer, option, .. } => {
                if answer.trim().is_empty() {
                    format!("{}) {}", option.id, option.text)
                } else {
                    answer.clone()
                }
            }
            Self::TrueFalse { verdict, .. } => verdict.to_string(),
        }
    }

    pub fn selected_option_id(&self) -> Option<&str> {
        match self {
            Self::MultipleChoice { option, .. } => Some(&option.id),
            _ => None,
        }
    }

    pub fn reasoning_steps(&self) -> &[String] {
        match self {
            Self::OpenEnded { reasoning_steps, .. }
            | Self::MultipleChoice { reasoning_steps, .. }
            | Self::TrueFalse { reasoning_steps, .. }
            | Self::ShortAnswer { reasoning_steps, .. } => reasoning_steps,
        }
    }

    /// The text the verifier checks against the evidence
    pub fn key_claim(&self) -> &str {
        match self {
            Self::OpenEnded { answer, .. } | Self::ShortAnswer { answer, .. } => answer,
            Self::MultipleChoice { option, .. } => &option.text,
            Self::TrueFalse { claim, .. } => claim,
        }
    }
}

/// Result of one synthesis call
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub answer: SynthesizedAnswer,
    /// 0-based indices into the evidence the answer relied on
    pub cited_chunks: Vec<usize>,
}

/// Builds prompts, calls the LLM and parses its answer
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Generate a typed answer.
    ///
    /// A multiple-choice answer that names no option, or several, fails with
    /// `Error::AmbiguousSelection` carrying the raw answer text. A true/false
    /// answer with no readable verdict fails with `Error::Synthesis`.
    pub async fn synthesize(
        &self,
        question: &Question,
        evidence: &[RetrievedChunk],
    ) -> Result<Synthesis> {
        if evidence.is_empty() {
            tracing::debug!("No evidence for question {}, asking model anyway", question.id);
        }

        let prompt = PromptBuilder::build(question, evidence);
        let schema = PromptBuilder::response_schema(question);

        let raw = self
            .llm
            .generate(&prompt, Some(&schema))
            .await
            .map_err(|e| Error::synthesis(format!("Generation via {} failed: {}", self.llm.name(), e)))?;

        parse_response(question, &raw, evidence.len())
    }
}

/// Parse a raw model response for `question` given `available` evidence chunks
pub fn parse_response(question: &Question, raw: &str, available: usize) -> Result<Synthesis> {
    let fields = extract_json_object(raw).ok_or_else(|| {
        Error::synthesis(format!(
            "Model response contains no JSON object: {}",
            truncate(raw, 200)
        ))
    })?;

    let answer = string_field(&fields, "answer");
    let mut reasoning_steps = string_list(fields.get("reasoning_steps"));
    if reasoning_steps.is_empty() {
        reasoning_steps = extract_reasoning_steps(&answer);
    }

    let mut references = fields
        .get("cited_chunks")
        .map(cited_numbers)
        .unwrap_or_default();
    references.extend(chunk_markers(&answer));
    references.extend(chunk_markers(&string_field(&fields, "justification")));
    for step in &reasoning_steps {
        references.extend(chunk_markers(step));
    }
    let mut cited_chunks = resolve_references(references, available);
    if cited_chunks.is_empty() {
        cited_chunks = (0..available).collect();
    }

    let answer = match question.question_type {
        QuestionType::OpenEnded => SynthesizedAnswer::OpenEnded {
            answer,
            reasoning_steps,
        },
        QuestionType::ShortAnswer => SynthesizedAnswer::ShortAnswer {
            answer,
            reasoning_steps,
        },
        QuestionType::MultipleChoice => {
            let selected = fields.get("selected_option").map(value_text).unwrap_or_default();
            match resolve_option(question.options(), &selected, &answer) {
                Some(option) => SynthesizedAnswer::MultipleChoice {
                    answer,
                    option: option.clone(),
                    reasoning_steps,
                },
                None => {
                    let raw_answer = if answer.trim().is_empty() { selected } else { answer };
                    return Err(Error::AmbiguousSelection {
                        raw_answer,
                        reasoning_steps,
                    });
                }
            }
        }
        QuestionType::TrueFalse => {
            let justification = string_field(&fields, "justification");
            let verdict = fields
                .get("verdict")
                .and_then(normalize_verdict)
                .or_else(|| verdict_from_text(&answer))
                .or_else(|| verdict_from_text(&justification))
                .ok_or_else(|| {
                    Error::synthesis(format!(
                        "No true/false verdict in model response for question {}",
                        question.id
                    ))
                })?;

            let claim = if justification.trim().is_empty() {
                question.text.clone()
            } else {
                justification.clone()
            };
            if !justification.trim().is_empty()
                && reasoning_steps.first().map(String::as_str) != Some(justification.as_str())
            {
                reasoning_steps.insert(0, justification.clone());
            }

            SynthesizedAnswer::TrueFalse {
                verdict,
                justification,
                claim,
                reasoning_steps,
            }
        }
    };

    Ok(Synthesis {
        answer,
        cited_chunks,
    })
}

/// Find the JSON object in a model response, tolerating code fences and prose around it
fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).map(value_text).unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let steps: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::String(s)) => s.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    };
    steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_id(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Exactly one matching option, else `None`
fn unique<'a>(mut matches: Vec<&'a QuestionOption>) -> Option<&'a QuestionOption> {
    matches.dedup_by(|a, b| a.id == b.id);
    match matches.as_slice() {
        [one] => Some(*one),
        _ => None,
    }
}

fn by_id<'a>(options: &'a [QuestionOption], id: &str) -> Option<&'a QuestionOption> {
    let id = normalize_id(id);
    if id.is_empty() {
        return None;
    }
    unique(options.iter().filter(|o| normalize_id(&o.id) == id).collect())
}

fn by_text<'a>(options: &'a [QuestionOption], text: &str) -> Option<&'a QuestionOption> {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }
    unique(
        options
            .iter()
            .filter(|o| {
                let option = o.text.trim().to_lowercase();
                !option.is_empty() && text.contains(&option)
            })
            .collect(),
    )
}

/// Leading token of a selection like `B) Venus`, `(c).` or `A`.
/// A token followed by anything but `)`, `.` or the end is a word, not an id.
fn leading_option_id(selected: &str) -> Option<&str> {
    let s = selected.trim_start_matches(|c: char| !c.is_alphanumeric());
    let end = s.find(|c: char| !c.is_alphanumeric()).unwrap_or(s.len());
    let (lead, rest) = s.split_at(end);
    let rest = rest.trim_start();
    (rest.is_empty() || rest.starts_with(')') || rest.starts_with('.')).then_some(lead)
}

/// Map the model's choice onto exactly one listed option:
/// the `selected_option` field by id, then by its leading token, then by option text;
/// then an `Answer: X` line; then option text quoted in the answer.
fn resolve_option<'a>(
    options: &'a [QuestionOption],
    selected: &str,
    answer: &str,
) -> Option<&'a QuestionOption> {
    by_id(options, selected)
        .or_else(|| leading_option_id(selected).and_then(|lead| by_id(options, lead)))
        .or_else(|| by_text(options, selected))
        .or_else(|| {
            ANSWER_LINE
                .captures(answer)
                .and_then(|cap| by_id(options, &cap[1]))
        })
        .or_else(|| by_text(options, answer))
}

fn normalize_verdict(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => verdict_from_text(s),
        _ => None,
    }
}

/// Read a verdict from the first word of `text`
fn verdict_from_text(text: &str) -> Option<bool> {
    let first = text
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())?
        .to_lowercase();
    if TRUE_WORDS.contains(&first.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&first.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc_question() -> Question {
        Question::new("q1", "Which planet has two moons?", QuestionType::MultipleChoice).with_options(vec![
            QuestionOption::new("A", "Mars"),
            QuestionOption::new("B", "Venus"),
            QuestionOption::new("C", "Mercury"),
        ])
    }

    #[test]
    fn test_open_ended_with_code_fence() {
        let question = Question::new("q", "Why is Mars red?", QuestionType::OpenEnded);
        let raw = "```json\n{\"answer\": \"Iron oxide covers its surface [Chunk 2].\", \"reasoning_steps\": [\"Chunk 2 names iron oxide\"], \"cited_chunks\": [2]}\n```";
        let synthesis = parse_response(&question, raw, 3).unwrap();

        assert_eq!(synthesis.answer.answer_text(), "Iron oxide covers its surface [Chunk 2].");
        assert_eq!(synthesis.answer.reasoning_steps(), ["Chunk 2 names iron oxide"]);
        assert_eq!(synthesis.cited_chunks, vec![1]);
        assert_eq!(synthesis.answer.selected_option_id(), None);
    }

    #[test]
    fn test_missing_fields_default_and_all_chunks_cited() {
        let question = Question::new("q", "How many moons?", QuestionType::ShortAnswer);
        let synthesis = parse_response(&question, "Sure! {\"answer\": \"Two.\"} Hope that helps", 2).unwrap();

        assert_eq!(synthesis.answer.answer_text(), "Two.");
        assert!(synthesis.answer.reasoning_steps().is_empty());
        assert_eq!(synthesis.cited_chunks, vec![0, 1]);
    }

    #[test]
    fn test_out_of_range_citations_ignored() {
        let question = Question::new("q", "Q?", QuestionType::OpenEnded);
        let synthesis =
            parse_response(&question, r#"{"answer": "x [Chunk 9]", "cited_chunks": [0, 5]}"#, 2).unwrap();
        assert_eq!(synthesis.cited_chunks, vec![0, 1]);
    }

    #[test]
    fn test_no_json_is_synthesis_error() {
        let question = Question::new("q", "Q?", QuestionType::OpenEnded);
        let err = parse_response(&question, "I think the answer is two.", 1).unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)));
    }

    #[test]
    fn test_reasoning_fallback_from_answer_lines() {
        let question = Question::new("q", "Q?", QuestionType::OpenEnded);
        let raw = r#"{"answer": "Summary\n1. The first document line supports this\n2. The second document line agrees"}"#;
        let synthesis = parse_response(&question, raw, 1).unwrap();
        assert_eq!(synthesis.answer.reasoning_steps().len(), 2);
    }

    #[test]
    fn test_multiple_choice_resolution() {
        let q = mc_question();

        let s = parse_response(&q, r#"{"answer": "Mars has Phobos and Deimos.", "selected_option": "a"}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("A"));
        assert_eq!(s.answer.key_claim(), "Mars");

        let s = parse_response(&q, r#"{"answer": "", "selected_option": "B) Venus"}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("B"));
        assert_eq!(s.answer.answer_text(), "B) Venus");

        let s = parse_response(&q, r#"{"answer": "", "selected_option": "(c)."}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("C"));

        // A leading article is not an option id
        let s = parse_response(&q, r#"{"answer": "", "selected_option": "a planet like Venus"}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("B"));

        let s = parse_response(&q, r#"{"answer": "Answer: C\nBecause..."}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("C"));

        let s = parse_response(&q, r#"{"answer": "It is mercury, clearly."}"#, 1).unwrap();
        assert_eq!(s.answer.selected_option_id(), Some("C"));
    }

    #[test]
    fn test_multiple_choice_ambiguous() {
        let q = mc_question();
        let err = parse_response(&q, r#"{"answer": "Either Mars or Venus", "reasoning_steps": ["unsure"]}"#, 1)
            .unwrap_err();
        match err {
            Error::AmbiguousSelection {
                raw_answer,
                reasoning_steps,
            } => {
                assert_eq!(raw_answer, "Either Mars or Venus");
                assert_eq!(reasoning_steps, vec!["unsure".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_response(&q, r#"{"answer": "", "selected_option": "E"}"#, 1).unwrap_err();
        assert!(matches!(err, Error::AmbiguousSelection { .. }));
    }

    #[test]
    fn test_true_false_normalization() {
        let q = Question::new("q", "Mars has two moons.", QuestionType::TrueFalse);

        let s = parse_response(&q, r#"{"verdict": "Doğru", "justification": "Mars has two moons, Phobos and Deimos."}"#, 1).unwrap();
        assert_eq!(s.answer.answer_text(), "true");
        assert_eq!(s.answer.key_claim(), "Mars has two moons, Phobos and Deimos.");
        assert_eq!(s.answer.reasoning_steps()[0], "Mars has two moons, Phobos and Deimos.");

        let s = parse_response(&q, r#"{"verdict": false}"#, 1).unwrap();
        assert_eq!(s.answer.answer_text(), "false");
        assert_eq!(s.answer.key_claim(), "Mars has two moons.");

        let s = parse_response(&q, r#"{"answer": "No, it has three."}"#, 1).unwrap();
        assert_eq!(s.answer.answer_text(), "false");

        let s = parse_response(&q, r#"{"verdict": "unclear", "justification": "Yes, Phobos and Deimos."}"#, 1).unwrap();
        assert_eq!(s.answer.answer_text(), "true");

        let err = parse_response(&q, r#"{"verdict": "maybe", "justification": "The text is silent."}"#, 1).unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)));
    }
}
