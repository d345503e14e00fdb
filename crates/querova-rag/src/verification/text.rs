//! Text normalization and lexical matching used by source verification

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Lowercased text with whitespace runs collapsed to one space and trimmed.
/// `origin[i]` is the character index in the source text that produced `chars[i]`.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub chars: Vec<char>,
    pub origin: Vec<usize>,
}

impl Normalized {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

pub fn normalize(text: &str) -> Normalized {
    let mut chars = Vec::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    let mut pending_space: Option<usize> = None;

    for (i, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            pending_space.get_or_insert(i);
            continue;
        }
        if let Some(space_at) = pending_space.take() {
            if !chars.is_empty() {
                chars.push(' ');
                origin.push(space_at);
            }
        }
        for lower in c.to_lowercase() {
            chars.push(lower);
            origin.push(i);
        }
    }

    Normalized { chars, origin }
}

/// Longest common substring of `a` and `b`: `(length, start in a, start in b)`
pub fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    if a.is_empty() || b.is_empty() {
        return (0, 0, 0);
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    let mut best = (0, 0, 0);

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            if curr[j] > best.0 {
                best = (curr[j], i - curr[j], j - curr[j]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Lowercased Unicode words
pub fn word_set(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// |a ∩ b| / |a ∪ b|; 0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Sentence spans of `text` as character ranges
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    for sentence in text.split_sentence_bounds() {
        let len = sentence.chars().count();
        spans.push((start, start + len));
        start += len;
    }
    spans
}

/// Widen the character range `[start, end)` to whole sentences of `text`
pub fn expand_to_sentences(text: &str, start: usize, end: usize) -> (usize, usize) {
    let spans = sentence_spans(text);
    let first = spans
        .iter()
        .find(|(s, e)| *s <= start && start < *e)
        .map_or(start, |(s, _)| *s);
    let last = spans
        .iter()
        .find(|(s, e)| *s < end && end <= *e)
        .map_or(end, |(_, e)| *e);
    (first, last)
}

/// Characters `[start, end)` of `text`
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}
