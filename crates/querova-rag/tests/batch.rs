//! Batch orchestration: ordering, failures and timeouts

mod common;

use common::{service, KeywordEmbedder, ScriptedLlm};
use once_cell::sync::Lazy;
use querova_rag::{QaService, QueryOptions, Question, QuestionType, RagConfig};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

static DELAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"delay-(\d+)").unwrap());

/// The model echoes nothing useful but sleeps for the `delay-<ms>` named in the question
fn delaying_llm() -> Arc<ScriptedLlm> {
    Arc::new(ScriptedLlm::new(|prompt| {
        let millis = DELAY
            .captures(prompt)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or(0);
        (Duration::from_millis(millis), r#"{"answer": "done"}"#.to_string())
    }))
}

fn batch_service(question_timeout_secs: u64, batch_timeout_secs: u64) -> QaService {
    let mut config = RagConfig::default();
    config.processing.max_concurrency = Some(4);
    config.processing.question_timeout_secs = question_timeout_secs;
    config.processing.batch_timeout_secs = batch_timeout_secs;
    service(config, KeywordEmbedder::new(&["delay"]), delaying_llm())
}

fn open(id: &str, text: &str) -> Question {
    Question::new(id, text, QuestionType::OpenEnded)
}

#[tokio::test(start_paused = true)]
async fn test_results_keep_submission_order() {
    let service = batch_service(60, 600);
    let questions = vec![
        open("q1", "first delay-300"),
        open("q2", "second delay-100"),
        open("q3", "third delay-0"),
        open("q4", "fourth delay-200"),
    ];

    let batch = service.ask_batch(questions, QueryOptions::default()).await.unwrap();

    let ids: Vec<&str> = batch.results.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q2", "q3", "q4"]);
    assert_eq!(batch.total_questions, 4);
    assert_eq!(batch.completed, 4);
    assert_eq!(batch.failed, 0);
    assert!(batch.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_question_is_recorded_not_dropped() {
    let service = batch_service(60, 600);
    let questions = vec![
        open("ok1", "fine delay-10"),
        Question::new("bad", "Pick one", QuestionType::MultipleChoice),
        open("ok2", "also fine"),
    ];

    let batch = service.ask_batch(questions, QueryOptions::default()).await.unwrap();

    assert_eq!(batch.completed, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.failures[0].question_id, "bad");
    assert_eq!(batch.failures[0].error_kind, "invalid_question");
    let ids: Vec<&str> = batch.results.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, vec!["ok1", "ok2"]);
}

#[tokio::test(start_paused = true)]
async fn test_question_timeout_fails_only_that_question() {
    let service = batch_service(1, 600);
    let questions = vec![open("stuck", "stuck delay-5000"), open("quick", "quick delay-10")];

    let batch = service.ask_batch(questions, QueryOptions::default()).await.unwrap();

    assert_eq!(batch.completed, 1);
    assert_eq!(batch.results[0].question_id, "quick");
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.failures[0].question_id, "stuck");
    assert_eq!(batch.failures[0].error_kind, "timeout");
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_keeps_finished_results() {
    let service = batch_service(60, 2);
    let questions = vec![
        open("a", "fast delay-100"),
        open("b", "slow delay-10000"),
        open("c", "fast again delay-500"),
    ];

    let batch = service.ask_batch(questions, QueryOptions::default()).await.unwrap();

    let ids: Vec<&str> = batch.results.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.failures[0].question_id, "b");
    assert_eq!(batch.failures[0].error_kind, "timeout");
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_of_one_still_orders_results() {
    let mut config = RagConfig::default();
    config.processing.max_concurrency = Some(1);
    let service = service(config, KeywordEmbedder::new(&["delay"]), delaying_llm());

    let questions: Vec<Question> = (0..5)
        .map(|i| open(&format!("q{}", i), &format!("question delay-{}", 50 * (5 - i))))
        .collect();
    let batch = service.ask_batch(questions, QueryOptions::default()).await.unwrap();

    let ids: Vec<String> = batch.results.iter().map(|r| r.question_id.clone()).collect();
    assert_eq!(ids, vec!["q0", "q1", "q2", "q3", "q4"]);
}
