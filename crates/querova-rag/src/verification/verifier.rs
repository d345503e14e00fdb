//! Deterministic re-scoring of cited chunks against an answer

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::VerificationConfig;
use crate::retrieval::RetrievedChunk;
use crate::types::{MatchType, Source, VerificationStatus};

use super::text::{
    char_slice, expand_to_sentences, jaccard, longest_common_substring, normalize, sentence_spans,
    word_set, Normalized,
};

/// Verification outcome for one answer
#[derive(Debug, Clone)]
pub struct Verification {
    /// Descending confidence, ties by retrieval rank
    pub sources: Vec<Source>,
    pub confidence_score: f32,
    pub verification_status: VerificationStatus,
}

/// Scores how well each cited chunk supports an answer.
/// Pure and infallible.
#[derive(Debug, Clone)]
pub struct SourceVerifier {
    config: VerificationConfig,
}

struct Scored {
    source: Source,
    rank: usize,
}

impl SourceVerifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn verify(&self, key_claim: &str, referenced: &[RetrievedChunk]) -> Verification {
        let claims = self.claims(key_claim);
        let answer_words = word_set(key_claim);

        let mut scored: Vec<Scored> = referenced
            .iter()
            .map(|item| Scored {
                source: self.score_chunk(&claims, &answer_words, item),
                rank: item.rank,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.source
                .confidence_score
                .total_cmp(&a.source.confidence_score)
                .then(a.rank.cmp(&b.rank))
        });
        let sources: Vec<Source> = scored.into_iter().map(|s| s.source).collect();

        let confidence_score = sources
            .iter()
            .map(|s| s.confidence_score)
            .reduce(f32::max)
            .unwrap_or(self.config.no_evidence_confidence);

        let verification_status = if sources.iter().any(|s| {
            s.match_type == MatchType::Exact
                && s.confidence_score >= self.config.verification_threshold
        }) {
            VerificationStatus::Verified
        } else if sources
            .iter()
            .any(|s| matches!(s.match_type, MatchType::Exact | MatchType::Paraphrase))
        {
            VerificationStatus::Partial
        } else {
            VerificationStatus::Unverified
        };

        Verification {
            sources,
            confidence_score,
            verification_status,
        }
    }

    /// Normalized claim sentences long enough to stand alone, or the whole claim
    fn claims(&self, key_claim: &str) -> Vec<Normalized> {
        let sentences: Vec<Normalized> = key_claim
            .split_sentence_bounds()
            .map(normalize)
            .filter(|n| n.len() >= self.config.min_claim_chars)
            .collect();
        if !sentences.is_empty() {
            return sentences;
        }

        let whole = normalize(key_claim);
        if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole]
        }
    }

    fn score_chunk(
        &self,
        claims: &[Normalized],
        answer_words: &HashSet<String>,
        item: &RetrievedChunk,
    ) -> Source {
        let text = &item.chunk.text;
        let chunk_norm = normalize(text);
        let chunk_words = word_set(text);

        // Best coverage of any claim sentence by one contiguous chunk span
        let best = claims
            .iter()
            .map(|claim| {
                let (len, _, chunk_at) = longest_common_substring(&claim.chars, &chunk_norm.chars);
                (len as f32 / claim.len() as f32, len, chunk_at)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let shares_word = !answer_words.is_disjoint(&chunk_words);

        let (match_type, exact_quote) = match best {
            Some((ratio, len, at)) if len > 0 && ratio >= self.config.exact_threshold && shares_word => {
                let start = chunk_norm.origin[at];
                let end = chunk_norm.origin[at + len - 1] + 1;
                let (s, e) = expand_to_sentences(text, start, end);
                (MatchType::Exact, char_slice(text, s, e).trim().to_string())
            }
            _ if shares_word && jaccard(&chunk_words, answer_words) > self.config.paraphrase_threshold => {
                (MatchType::Paraphrase, best_overlap_sentence(text, answer_words))
            }
            _ => (MatchType::Inference, best_overlap_sentence(text, answer_words)),
        };

        let type_weight = match match_type {
            MatchType::Exact => self.config.exact_weight,
            MatchType::Paraphrase => self.config.paraphrase_weight,
            MatchType::Inference => self.config.inference_weight,
        };
        let confidence_score = (self.config.retrieval_weight * item.score.clamp(0.0, 1.0)
            + self.config.match_weight * type_weight)
            .clamp(0.0, 1.0);

        Source {
            chunk_id: item.chunk.id,
            document_id: item.chunk.document_id,
            exact_quote,
            context: text.clone(),
            page_number: item.chunk.page_number,
            relevance_score: item.score,
            match_type,
            confidence_score,
        }
    }
}

/// The chunk sentence sharing the most words with the answer (first on ties)
fn best_overlap_sentence(text: &str, answer_words: &HashSet<String>) -> String {
    let best = sentence_spans(text)
        .into_iter()
        .map(|(s, e)| char_slice(text, s, e))
        .filter(|sentence| !sentence.trim().is_empty())
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            let overlap = |s: &str| word_set(s).intersection(answer_words).count();
            overlap(a).cmp(&overlap(b)).then(ib.cmp(ia))
        })
        .map(|(_, sentence)| sentence.trim().to_string());

    best.unwrap_or_else(|| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use uuid::Uuid;

    fn retrieved(text: &str, score: f32, rank: usize) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                text: text.to_string(),
                char_start: 0,
                char_end: text.chars().count(),
                chunk_index: rank as u32,
                page_number: Some(1),
                embedding: Vec::new(),
            },
            score,
            rank,
        }
    }

    fn verifier() -> SourceVerifier {
        SourceVerifier::new(VerificationConfig::default())
    }

    #[test]
    fn test_exact_match_quotes_whole_sentence() {
        let chunk = "The spacecraft launched in 1977. Voyager 1 crossed the heliopause in 2012. It still transmits.";
        let v = verifier().verify("Voyager 1 crossed the heliopause in 2012", &[retrieved(chunk, 0.8, 0)]);

        let source = &v.sources[0];
        assert_eq!(source.match_type, MatchType::Exact);
        assert_eq!(source.exact_quote, "Voyager 1 crossed the heliopause in 2012.");
        assert!(chunk.contains(&source.exact_quote));
        assert_eq!(source.context, chunk);
        // 0.4 * 0.8 + 0.6 * 1.0
        assert!((source.confidence_score - 0.92).abs() < 1e-5);
        assert_eq!(v.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn test_exact_ignores_case_and_whitespace() {
        let chunk = "Notes.\nMARS   has two\n moons named Phobos and Deimos.";
        let v = verifier().verify("Mars has two moons named Phobos and Deimos", &[retrieved(chunk, 0.6, 0)]);
        assert_eq!(v.sources[0].match_type, MatchType::Exact);
        assert!(chunk.contains(&v.sources[0].exact_quote));
    }

    #[test]
    fn test_paraphrase() {
        let chunk = "Phobos and Deimos are the two small moons that orbit Mars closely.";
        let v = verifier().verify("Mars is orbited by two small moons.", &[retrieved(chunk, 0.7, 0)]);

        assert_eq!(v.sources[0].match_type, MatchType::Paraphrase);
        assert_eq!(v.verification_status, VerificationStatus::Partial);
        // 0.4 * 0.7 + 0.6 * 0.7
        assert!((v.confidence_score - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_zero_overlap_is_inference_and_unverified() {
        let chunk = "Quarterly revenue rose sharply across all regions.";
        let v = verifier().verify("Photosynthesis needs sunlight.", &[retrieved(chunk, 0.9, 0)]);

        assert_eq!(v.sources[0].match_type, MatchType::Inference);
        assert_eq!(v.verification_status, VerificationStatus::Unverified);
        assert!(chunk.contains(&v.sources[0].exact_quote));
    }

    #[test]
    fn test_zero_overlap_is_inference_at_zero_paraphrase_threshold() {
        let config = VerificationConfig {
            paraphrase_threshold: 0.0,
            ..VerificationConfig::default()
        };
        let chunk = "Quarterly revenue rose sharply.";
        let v = SourceVerifier::new(config).verify("Photosynthesis needs sunlight.", &[retrieved(chunk, 0.9, 0)]);

        assert_eq!(v.sources[0].match_type, MatchType::Inference);
        assert_eq!(v.verification_status, VerificationStatus::Unverified);
    }

    #[test]
    fn test_substring_inside_longer_word_is_not_exact() {
        let chunk = "Marshmallows are sweet.";
        let v = verifier().verify("Mars", &[retrieved(chunk, 0.9, 0)]);
        assert_ne!(v.sources[0].match_type, MatchType::Exact);
    }

    #[test]
    fn test_no_sources_uses_no_evidence_confidence() {
        let v = verifier().verify("Anything at all", &[]);
        assert!(v.sources.is_empty());
        assert_eq!(v.confidence_score, VerificationConfig::default().no_evidence_confidence);
        assert_eq!(v.verification_status, VerificationStatus::Unverified);
    }

    #[test]
    fn test_low_retrieval_exact_is_partial() {
        let config = VerificationConfig {
            verification_threshold: 0.95,
            ..VerificationConfig::default()
        };
        let chunk = "Water boils at 100 degrees at sea level.";
        let v = SourceVerifier::new(config).verify("Water boils at 100 degrees", &[retrieved(chunk, 0.5, 0)]);
        assert_eq!(v.sources[0].match_type, MatchType::Exact);
        assert_eq!(v.verification_status, VerificationStatus::Partial);
    }

    #[test]
    fn test_sources_sorted_by_confidence_then_rank() {
        let claim = "Water boils at 100 degrees";
        let v = verifier().verify(
            claim,
            &[
                retrieved("Unrelated text about trains.", 0.9, 0),
                retrieved("Water boils at 100 degrees at sea level.", 0.6, 1),
                retrieved("Other unrelated words entirely.", 0.9, 2),
            ],
        );

        assert_eq!(v.sources[0].match_type, MatchType::Exact);
        assert_eq!(v.sources[1].exact_quote, "Unrelated text about trains.");
        assert_eq!(v.sources[2].exact_quote, "Other unrelated words entirely.");
        assert_eq!(v.confidence_score, v.sources[0].confidence_score);
    }
}
