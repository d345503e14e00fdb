//! Retrieve, synthesize and verify one question

use std::time::Instant;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::retrieval::{RetrievedChunk, Retriever};
use crate::types::{AnswerResult, Question};
use crate::verification::SourceVerifier;

/// Retrieval parameters for one question or batch
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub min_relevance_score: f32,
    /// Restrict retrieval to these documents; `None` searches everything
    pub document_ids: Option<Vec<Uuid>>,
}

impl RetrievalOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_relevance_score: config.min_relevance_score,
            document_ids: None,
        }
    }
}

/// The per-question chain: retrieve, synthesize, verify
#[derive(Clone)]
pub struct QuestionPipeline {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    verifier: SourceVerifier,
}

impl QuestionPipeline {
    pub fn new(retriever: Retriever, synthesizer: AnswerSynthesizer, verifier: SourceVerifier) -> Self {
        Self {
            retriever,
            synthesizer,
            verifier,
        }
    }

    /// Answer one question.
    ///
    /// An ambiguous multiple-choice selection is not an error here: the raw
    /// answer is reported without a `selected_option_id` and verified as-is.
    pub async fn answer(&self, question: &Question, options: &RetrievalOptions) -> Result<AnswerResult> {
        question.validate()?;
        let started = Instant::now();

        let evidence = self
            .retriever
            .retrieve(
                &question.text,
                options.top_k,
                options.min_relevance_score,
                options.document_ids.as_deref(),
            )
            .await?;

        let (answer, selected_option_id, reasoning_steps, key_claim, referenced) =
            match self.synthesizer.synthesize(question, &evidence).await {
                Ok(synthesis) => {
                    let referenced: Vec<RetrievedChunk> = synthesis
                        .cited_chunks
                        .iter()
                        .filter_map(|&i| evidence.get(i).cloned())
                        .collect();
                    let answer = synthesis.answer;
                    (
                        answer.answer_text(),
                        answer.selected_option_id().map(str::to_string),
                        answer.reasoning_steps().to_vec(),
                        answer.key_claim().to_string(),
                        referenced,
                    )
                }
                Err(Error::AmbiguousSelection {
                    raw_answer,
                    reasoning_steps,
                }) => {
                    tracing::warn!(
                        "Question {}: answer did not name exactly one option, reporting raw text",
                        question.id
                    );
                    (raw_answer.clone(), None, reasoning_steps, raw_answer, evidence.clone())
                }
                Err(e) => return Err(e),
            };

        let verification = self.verifier.verify(&key_claim, &referenced);

        tracing::info!(
            "Answered {} ({}) with {} sources, status {:?}, confidence {:.2}",
            question.id,
            question.question_type.as_str(),
            verification.sources.len(),
            verification.verification_status,
            verification.confidence_score
        );

        Ok(AnswerResult {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            question_type: question.question_type,
            answer,
            selected_option_id,
            reasoning_steps,
            sources: verification.sources,
            confidence_score: verification.confidence_score,
            verification_status: verification.verification_status,
            processing_time: started.elapsed().as_secs_f64(),
            model_used: self.synthesizer.model().to_string(),
        })
    }
}
