//! Chunk references and reasoning steps in model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CHUNK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(?:chunk|source|kaynak)\s*(\d+)\]").expect("Invalid regex")
});

static STEP_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\d+[.)]\s+|[-•*]\s+|(?:step|adım)\s+\d+:)").expect("Invalid regex")
});

/// Maximum reasoning steps recovered from free text
const MAX_STEPS: usize = 5;
/// Lines this short are list noise, not reasoning
const MIN_STEP_CHARS: usize = 15;

/// 1-based chunk numbers referenced by `[Chunk N]` / `[Source N]` markers
pub fn chunk_markers(text: &str) -> Vec<usize> {
    CHUNK_MARKER
        .captures_iter(text)
        .filter_map(|cap| cap[1].parse().ok())
        .collect()
}

/// 1-based chunk numbers from a `cited_chunks` JSON value.
/// Accepts integers, numeric strings and `"Chunk N"` strings.
pub fn cited_numbers(value: &Value) -> Vec<usize> {
    let parse = |v: &Value| -> Option<usize> {
        match v {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok(),
            _ => None,
        }
    };

    match value {
        Value::Array(items) => items.iter().filter_map(parse).collect(),
        other => parse(other).into_iter().collect(),
    }
}

/// Convert 1-based references to sorted, de-duplicated 0-based indices,
/// dropping anything outside `1..=available`
pub fn resolve_references(numbers: impl IntoIterator<Item = usize>, available: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = numbers
        .into_iter()
        .filter(|n| (1..=available).contains(n))
        .map(|n| n - 1)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Recover reasoning steps from numbered or bulleted lines
pub fn extract_reasoning_steps(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| STEP_MARKER.is_match(line))
        .map(|line| STEP_MARKER.replace(line, "").trim().to_string())
        .filter(|step| step.chars().count() > MIN_STEP_CHARS)
        .take(MAX_STEPS)
        .collect()
}
