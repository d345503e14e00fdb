//! Source verification
//!
//! Each cited chunk is classified as an exact, paraphrase or inference
//! match for the answer's key claim and given a confidence score.

pub mod text;
pub mod verifier;

pub use verifier::{SourceVerifier, Verification};
