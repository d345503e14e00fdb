//! Core types for the Q&A system

pub mod answer;
pub mod document;
pub mod question;

pub use answer::{
    AnswerResult, MatchType, QuestionBatch, QuestionFailure, Source, VerificationStatus,
};
pub use document::{Chunk, Document, FileType};
pub use question::{parse_options, Question, QuestionOption, QuestionType};
