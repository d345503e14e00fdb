//! Document ingestion: text extraction, chunking and indexing

pub mod chunker;
mod parser;
mod processor;

pub use chunker::{ChunkDraft, TextChunker};
pub use parser::{DefaultExtractor, ExtractedText, TextExtractor};
pub use processor::IngestPipeline;
