//! Bounded-concurrency batch execution

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at};
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::types::{AnswerResult, Question, QuestionBatch, QuestionFailure};

use super::pipeline::{QuestionPipeline, RetrievalOptions};

/// Options for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub retrieval: RetrievalOptions,
    pub max_concurrency: usize,
    pub question_timeout: Duration,
    pub batch_timeout: Duration,
}

impl BatchOptions {
    pub fn new(retrieval: RetrievalOptions, processing: &ProcessingConfig) -> Self {
        Self {
            retrieval,
            max_concurrency: processing.concurrency(),
            question_timeout: processing.question_timeout(),
            batch_timeout: processing.batch_timeout(),
        }
    }
}

/// Runs questions through the pipeline concurrently.
/// Results come back in submission order; failures are recorded, never dropped.
#[derive(Clone)]
pub struct BatchProcessor {
    pipeline: Arc<QuestionPipeline>,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<QuestionPipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn process(&self, questions: Vec<Question>, options: BatchOptions) -> QuestionBatch {
        let started = Instant::now();
        let batch_id = Uuid::new_v4();
        let total = questions.len();
        let deadline = tokio::time::Instant::now() + options.batch_timeout;

        tracing::info!(
            "Batch {}: {} questions, concurrency {}, {}s per question",
            batch_id,
            total,
            options.max_concurrency,
            options.question_timeout.as_secs()
        );

        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let mut slots: Vec<Option<Result<AnswerResult>>> = (0..total).map(|_| None).collect();

        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        let retrieval = Arc::new(options.retrieval);
        let question_timeout = options.question_timeout;
        let mut tasks = JoinSet::new();

        for (index, question) in questions.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            let retrieval = Arc::clone(&retrieval);

            tasks.spawn(async move {
                // Waiting for a permit does not count against the question's timeout
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(Error::internal("batch semaphore closed")));
                };

                let result = match timeout(question_timeout, pipeline.answer(&question, &retrieval)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(format!(
                        "question '{}' exceeded {}s",
                        question.id,
                        question_timeout.as_secs_f64()
                    ))),
                };
                (index, result)
            });
        }

        let mut deadline_hit = false;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => slots[index] = Some(result),
                Ok(Some(Err(e))) => {
                    tracing::error!("Batch {}: question task failed: {}", batch_id, e);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Batch {}: deadline of {}s reached, cancelling {} unfinished questions",
                        batch_id,
                        options.batch_timeout.as_secs(),
                        tasks.len()
                    );
                    tasks.abort_all();
                    deadline_hit = true;
                    break;
                }
            }
        }

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (slot, question_id) in slots.into_iter().zip(ids) {
            let outcome = slot.unwrap_or_else(|| {
                Err(if deadline_hit {
                    Error::Timeout(format!(
                        "batch deadline reached before question '{}' finished",
                        question_id
                    ))
                } else {
                    Error::internal(format!("task for question '{}' did not complete", question_id))
                })
            });

            match outcome {
                Ok(answer) => results.push(answer),
                Err(e) => {
                    tracing::warn!("Question {} failed: {}", question_id, e);
                    failures.push(QuestionFailure {
                        question_id,
                        error_kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let batch = QuestionBatch {
            batch_id,
            total_questions: total,
            completed: results.len(),
            failed: failures.len(),
            results,
            failures,
            total_processing_time: started.elapsed().as_secs_f64(),
            timestamp: chrono::Utc::now(),
        };

        tracing::info!(
            "Batch {} finished: {}/{} answered in {:.2}s",
            batch_id,
            batch.completed,
            batch.total_questions,
            batch.total_processing_time
        );

        batch
    }
}
