//! Question processing: the per-question pipeline and batch orchestration

mod batch;
mod pipeline;

pub use batch::{BatchOptions, BatchProcessor};
pub use pipeline::{QuestionPipeline, RetrievalOptions};
