//! Question answering endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::service::{QaService, QueryOptions};
use crate::types::{AnswerResult, Question, QuestionBatch, QuestionType};

/// Body of `POST /questions/single`
#[derive(Debug, Deserialize)]
pub struct SingleQuestionRequest {
    pub question: String,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(flatten)]
    pub options: QueryOptions,
}

/// Body of `POST /questions/process`
#[derive(Debug, Deserialize)]
pub struct ProcessQuestionsRequest {
    pub questions: Vec<Question>,
    #[serde(flatten)]
    pub options: QueryOptions,
}

/// POST /api/v1/questions/single
pub async fn single(
    State(service): State<QaService>,
    Json(request): Json<SingleQuestionRequest>,
) -> Result<Json<AnswerResult>> {
    let id = Uuid::new_v4().to_string();
    let question = match request.question_type {
        Some(question_type) => Question::new(id, request.question, question_type),
        None => Question::from_text(id, request.question),
    };

    tracing::info!(
        "Single question ({}): {}",
        question.question_type.as_str(),
        question.text.chars().take(50).collect::<String>()
    );
    Ok(Json(service.ask(question, request.options).await?))
}

/// POST /api/v1/questions/process
pub async fn process(
    State(service): State<QaService>,
    Json(request): Json<ProcessQuestionsRequest>,
) -> Result<Json<QuestionBatch>> {
    if request.questions.is_empty() {
        return Err(Error::InvalidQuestion("no questions provided".to_string()));
    }
    Ok(Json(service.ask_batch(request.questions, request.options).await?))
}

/// POST /api/v1/questions/upload-json - multipart field holding a `.json` question file
pub async fn upload_json(State(service): State<QaService>, mut multipart: Multipart) -> Result<Json<QuestionBatch>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidQuestion(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !filename.to_lowercase().ends_with(".json") {
            return Err(Error::UnsupportedFileType(format!("{} (only .json question files)", filename)));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidQuestion(format!("Failed to read {}: {}", filename, e)))?;
        return Ok(Json(service.ask_question_file(&bytes, QueryOptions::default()).await?));
    }

    Err(Error::InvalidQuestion("No question file in multipart body".to_string()))
}
