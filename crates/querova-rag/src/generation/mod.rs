//! Answer synthesis: prompts, LLM call and typed parsing

pub mod citation;
pub mod prompt;
pub mod synthesizer;

pub use prompt::PromptBuilder;
pub use synthesizer::{parse_response, AnswerSynthesizer, Synthesis, SynthesizedAnswer};
