//! querova-rag: evidence-grounded question answering over uploaded documents
//!
//! Documents are split into overlapping, page-tagged chunks and embedded.
//! Each question retrieves the closest chunks, gets a typed answer from a
//! language model, and then has every cited chunk independently re-scored
//! so the caller sees how well the evidence actually supports the answer.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;
pub mod verification;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use service::{CollectionStats, DeleteOutcome, QaService, QueryOptions, UploadOutcome};
pub use types::{
    AnswerResult, Chunk, Document, FileType, MatchType, Question, QuestionBatch, QuestionOption,
    QuestionType, Source, VerificationStatus,
};
