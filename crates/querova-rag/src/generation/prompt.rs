//! Prompt templates for answer synthesis

use serde_json::{json, Value};

use crate::retrieval::RetrievedChunk;
use crate::types::{Question, QuestionType};

const GROUNDING_RULES: &str = r#"You are a document analysis assistant that ONLY uses information from the provided evidence.

GROUNDING RULES - FOLLOW THESE EXACTLY:
1. Answer only from the EVIDENCE chunks below. Never use outside or general knowledge.
2. Refer to evidence inline as [Chunk N] and list every chunk you relied on in "cited_chunks".
3. If the evidence does not contain the answer, say so in "answer" instead of guessing.
4. Stay close to the source wording; quote it verbatim where you can."#;

const NO_EVIDENCE: &str = "No evidence available. None of the uploaded documents matched this question. \
State that the documents do not contain the answer; do not answer from general knowledge.";

/// Prompt builder for typed, evidence-grounded answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the full prompt for a question and its evidence
    pub fn build(question: &Question, evidence: &[RetrievedChunk]) -> String {
        let schema = serde_json::to_string_pretty(&Self::response_schema(question))
            .unwrap_or_default();

        format!(
            "{rules}\n\nEVIDENCE:\n{context}\n\n{task}\n\nRespond with a single JSON object matching this schema and nothing else:\n{schema}\n",
            rules = GROUNDING_RULES,
            context = Self::build_context(evidence),
            task = Self::task_section(question),
            schema = schema,
        )
    }

    /// Format evidence chunks as `[Chunk N]` blocks, numbered from 1
    pub fn build_context(evidence: &[RetrievedChunk]) -> String {
        if evidence.is_empty() {
            return NO_EVIDENCE.to_string();
        }

        evidence
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let page = item
                    .chunk
                    .page_number
                    .map(|p| format!("page {}, ", p))
                    .unwrap_or_default();
                format!(
                    "[Chunk {}] ({}relevance {:.0}%)\n{}",
                    i + 1,
                    page,
                    item.score.clamp(0.0, 1.0) * 100.0,
                    item.chunk.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    fn task_section(question: &Question) -> String {
        match question.question_type {
            QuestionType::OpenEnded => format!(
                "QUESTION: {}\n\nWrite a complete answer of two to four short paragraphs in \"answer\". \
                 Put your step-by-step reasoning in \"reasoning_steps\".",
                question.text
            ),
            QuestionType::MultipleChoice => {
                let options = question
                    .options()
                    .iter()
                    .map(|o| format!("{}) {}", o.id, o.text))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "QUESTION: {}\n\nOPTIONS:\n{}\n\nSet \"selected_option\" to exactly one option id from the list above. \
                     Explain why it is correct in \"answer\" and why the others are not in \"reasoning_steps\".",
                    question.text, options
                )
            }
            QuestionType::TrueFalse => format!(
                "STATEMENT: {}\n\nDecide whether the statement is true or false according to the evidence. \
                 Set \"verdict\" to true or false and put the evidence sentence that decides it in \"justification\".",
                question.text
            ),
            QuestionType::ShortAnswer => format!(
                "QUESTION: {}\n\nAnswer in one or two sentences in \"answer\".",
                question.text
            ),
        }
    }

    /// JSON schema of the expected response object
    pub fn response_schema(question: &Question) -> Value {
        let mut properties = json!({
            "answer": { "type": "string" },
            "reasoning_steps": { "type": "array", "items": { "type": "string" } },
            "cited_chunks": { "type": "array", "items": { "type": "integer" } },
        });
        let mut required = vec!["answer", "reasoning_steps", "cited_chunks"];

        match question.question_type {
            QuestionType::MultipleChoice => {
                let ids: Vec<&str> = question.options().iter().map(|o| o.id.as_str()).collect();
                properties["selected_option"] = json!({ "type": "string", "enum": ids });
                required.push("selected_option");
            }
            QuestionType::TrueFalse => {
                properties["verdict"] = json!({ "type": "boolean" });
                properties["justification"] = json!({ "type": "string" });
                required.extend(["verdict", "justification"]);
            }
            QuestionType::OpenEnded | QuestionType::ShortAnswer => {}
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, QuestionOption};
    use uuid::Uuid;

    fn evidence(text: &str, page: Option<u32>, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                text: text.to_string(),
                char_start: 0,
                char_end: text.chars().count(),
                chunk_index: 0,
                page_number: page,
                embedding: Vec::new(),
            },
            score,
            rank: 0,
        }
    }

    #[test]
    fn test_context_labels_chunks() {
        let context = PromptBuilder::build_context(&[
            evidence("Mars has two moons.", Some(4), 0.82),
            evidence("Venus has none.", None, 0.61),
        ]);
        assert!(context.contains("[Chunk 1] (page 4, relevance 82%)\nMars has two moons."));
        assert!(context.contains("[Chunk 2] (relevance 61%)"));
    }

    #[test]
    fn test_no_evidence_framing() {
        let question = Question::new("q", "Is the moon made of cheese?", QuestionType::TrueFalse);
        let prompt = PromptBuilder::build(&question, &[]);
        assert!(prompt.contains("No evidence available"));
        assert!(prompt.contains("STATEMENT: Is the moon made of cheese?"));
        assert!(prompt.contains("\"verdict\""));
    }

    #[test]
    fn test_multiple_choice_schema_lists_ids() {
        let question = Question::new("q", "Which planet?", QuestionType::MultipleChoice)
            .with_options(vec![QuestionOption::new("A", "Mars"), QuestionOption::new("B", "Venus")]);
        let schema = PromptBuilder::response_schema(&question);
        assert_eq!(schema["properties"]["selected_option"]["enum"], json!(["A", "B"]));

        let prompt = PromptBuilder::build(&question, &[evidence("Mars is red.", None, 0.9)]);
        assert!(prompt.contains("A) Mars\nB) Venus"));
        assert!(prompt.contains("ONLY uses information from the provided evidence"));
    }
}
