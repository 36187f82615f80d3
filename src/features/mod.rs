// src/features/mod.rs
// FeatureExtractor: turns raw text plus the parser result into a weighted
// numeric feature map. Generators are independent and failure-isolated; a
// generator that panics contributes nothing instead of aborting extraction.

use crate::kb::KnowledgeBase;
use crate::parser::types::{CompactParseResult, ParseSource};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Feature name → weight. BTreeMap keeps key order stable across calls.
pub type FeatureVector = BTreeMap<String, f32>;

/// Tokens a negator keeps "live" ahead of itself. Lexicon hits inside the
/// window flip sign; the window decays one token per non-negator word.
const NEGATION_WINDOW: usize = 4;
/// Flipped hits contribute at this fraction of their positive weight.
const NEGATION_FLIP_FACTOR: f32 = 0.6;

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "dont", "can't", "cant", "won't", "wont", "isn't", "isnt",
    "aren't", "arent", "wasn't", "wasnt", "didn't", "didnt", "doesn't", "doesnt", "ain't",
];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "glad", "love", "wonderful", "excited", "thank", "appreciate",
    "amazing", "nice", "sweet", "fun",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "awful", "terrible", "hate", "horrible", "worst", "angry", "upset", "annoyed", "hurt",
    "miserable", "unfair", "wrong",
];

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("word regex"));

static POSITIVE_EMOJI: &[char] = &['😊', '🥰', '😍', '😂', '❤', '💕', '👍', '🙂'];
static NEGATIVE_EMOJI: &[char] = &['😢', '😭', '😡', '😠', '💔', '😞', '🙄', '😤'];

pub struct FeatureExtractor {
    kb: Arc<KnowledgeBase>,
}

impl FeatureExtractor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Run every generator, merging each output scaled by its weight. The
    /// result is owned by the caller; nothing here is shared or retained.
    pub fn extract(&self, text: &str, parse: &CompactParseResult) -> FeatureVector {
        let lower = text.to_ascii_lowercase();
        let words: Vec<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();

        let mut features = FeatureVector::new();
        let generators: [(&str, f32, &dyn Fn() -> FeatureVector); 9] = [
            ("emotion_lexicon", 1.0, &|| self.emotion_features(&lower, &words)),
            ("paralinguistic", 0.8, &|| paralinguistic_features(text)),
            ("context", 1.0, &|| self.context_features(&lower, parse)),
            ("attachment_markers", 1.0, &|| self.attachment_features(&lower)),
            ("intensity", 1.0, &|| self.intensity_features(&lower, text)),
            ("complexity", 0.5, &|| complexity_features(&words, parse)),
            ("sentiment", 0.8, &|| sentiment_features(&words)),
            ("sarcasm", 1.0, &|| sarcasm_features(parse)),
            ("phrase_edges", 1.0, &|| self.edge_features(&lower, parse)),
        ];

        for (name, weight, generator) in generators {
            match catch_unwind(AssertUnwindSafe(generator)) {
                Ok(partial) => merge_scaled(&mut features, partial, weight),
                Err(_) => {
                    warn!(generator = name, "Feature generator panicked; contributing no features");
                }
            }
        }

        features
    }

    /// Emotion lexicon hits with the negation forward scan. Single-word
    /// terms are matched per token so the negation window applies;
    /// multi-word phrases are matched on the raw lowercase text.
    fn emotion_features(&self, lower: &str, words: &[&str]) -> FeatureVector {
        let mut out = FeatureVector::new();
        let mut window = 0usize;
        let mut negation_hits = 0u32;

        for word in words {
            if NEGATORS.contains(word) {
                window = NEGATION_WINDOW;
                continue;
            }
            if let Some(hits) = self.kb.emotion_lexicon.get(*word) {
                for (tone, weight) in hits {
                    let key = format!("emotion.{tone}");
                    if window > 0 {
                        *out.entry(key).or_default() -= weight * NEGATION_FLIP_FACTOR;
                        negation_hits += 1;
                    } else {
                        *out.entry(key).or_default() += weight;
                    }
                }
            }
            window = window.saturating_sub(1);
        }

        for (term, hits) in &self.kb.emotion_lexicon {
            if term.contains(' ') && lower.contains(term.as_str()) {
                for (tone, weight) in hits {
                    *out.entry(format!("emotion.{tone}")).or_default() += weight;
                }
            }
        }

        if negation_hits > 0 {
            out.insert("negation.hits".to_string(), negation_hits as f32);
            out.insert("negation.flag".to_string(), 1.0);
        }
        out
    }

    fn context_features(&self, lower: &str, parse: &CompactParseResult) -> FeatureVector {
        let mut out = FeatureVector::new();
        for rule in &self.kb.context_rules {
            let hits = rule
                .keywords
                .iter()
                .filter(|kw| lower.contains(kw.as_str()))
                .count();
            if hits > 0 {
                *out.entry(format!("context.{}", rule.context)).or_default() +=
                    hits as f32 * rule.weight;
            }
        }
        // The external parser's own context guess, down-weighted when it
        // came from the fallback analyzer.
        if parse.context.label != "general" {
            let fidelity = if parse.source == ParseSource::Fallback {
                0.5
            } else {
                1.0
            };
            *out.entry(format!("context.{}", parse.context.label))
                .or_default() += parse.context.score * fidelity;
        }
        out
    }

    fn attachment_features(&self, lower: &str) -> FeatureVector {
        let mut out = FeatureVector::new();
        for rule in &self.kb.attachment_markers {
            let hits = rule
                .patterns
                .iter()
                .filter(|p| lower.contains(p.as_str()))
                .count();
            if hits > 0 {
                *out.entry(format!("attach.{}", rule.style)).or_default() +=
                    hits as f32 * rule.weight;
            }
        }
        out
    }

    /// Rolls amplifier/dampener hits plus punctuation pressure into a
    /// single intensity score in [0, 1].
    fn intensity_features(&self, lower: &str, text: &str) -> FeatureVector {
        let mut amplifiers = 0u32;
        let mut dampeners = 0u32;
        for (term, factor) in &self.kb.intensity_modifiers {
            if lower.contains(term.as_str()) {
                if *factor > 1.0 {
                    amplifiers += 1;
                } else {
                    dampeners += 1;
                }
            }
        }

        let exclaims = text.chars().filter(|c| *c == '!').count() as f32;
        let caps = caps_ratio(text);

        let score = (0.4 + 0.14 * amplifiers as f32 - 0.12 * dampeners as f32
            + 0.05 * exclaims.min(4.0)
            + 0.25 * caps)
            .clamp(0.0, 1.0);

        let mut out = FeatureVector::new();
        out.insert("intensity.score".to_string(), score);
        out.insert("intensity.amplifiers".to_string(), amplifiers as f32);
        out.insert("intensity.dampeners".to_string(), dampeners as f32);
        out
    }

    fn edge_features(&self, lower: &str, parse: &CompactParseResult) -> FeatureVector {
        let mut out = FeatureVector::new();
        let mut total = 0f32;
        for edge in &self.kb.phrase_edges {
            let hits = edge.regex.find_iter(lower).count();
            if hits > 0 {
                *out.entry(format!("edges.{}", edge.label)).or_default() +=
                    hits as f32 * edge.weight;
                total += hits as f32;
            }
        }
        total += parse.phrase_edges.hits.len() as f32;
        if total > 0.0 {
            out.insert("edges.hits".to_string(), total);
        }
        out
    }
}

fn paralinguistic_features(text: &str) -> FeatureVector {
    let mut out = FeatureVector::new();
    let exclaims = text.chars().filter(|c| *c == '!').count();
    let questions = text.chars().filter(|c| *c == '?').count();
    let ellipses = text.matches("...").count() + text.matches('…').count();

    if exclaims > 0 {
        out.insert("para.exclaim".to_string(), (exclaims as f32).min(5.0));
    }
    if questions > 0 {
        out.insert("para.question".to_string(), (questions as f32).min(5.0));
    }
    if ellipses > 0 {
        out.insert("para.ellipsis".to_string(), ellipses as f32);
    }

    let caps = caps_ratio(text);
    if caps > 0.0 {
        out.insert("para.caps_ratio".to_string(), caps);
    }

    if has_letter_stretch(text) {
        out.insert("para.stretch".to_string(), 1.0);
    }

    let pos_emoji = text.chars().filter(|c| POSITIVE_EMOJI.contains(c)).count();
    let neg_emoji = text.chars().filter(|c| NEGATIVE_EMOJI.contains(c)).count();
    if pos_emoji > 0 {
        out.insert("para.emoji_pos".to_string(), pos_emoji as f32);
    }
    if neg_emoji > 0 {
        out.insert("para.emoji_neg".to_string(), neg_emoji as f32);
    }
    out
}

fn complexity_features(words: &[&str], parse: &CompactParseResult) -> FeatureVector {
    let mut out = FeatureVector::new();
    let token_count = if parse.tokens.is_empty() {
        words.len()
    } else {
        parse.tokens.len()
    };
    let sentence_count = parse.sents.len().max(1);

    out.insert(
        "complexity.tokens".to_string(),
        (token_count as f32 / 40.0).min(1.0),
    );
    out.insert(
        "complexity.avg_sentence_len".to_string(),
        (token_count as f32 / sentence_count as f32 / 20.0).min(1.0),
    );
    if !words.is_empty() {
        let long = words.iter().filter(|w| w.len() >= 7).count();
        out.insert(
            "complexity.long_word_ratio".to_string(),
            long as f32 / words.len() as f32,
        );
    }
    out
}

fn sentiment_features(words: &[&str]) -> FeatureVector {
    let pos = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count() as f32;
    let neg = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count() as f32;
    let mut out = FeatureVector::new();
    if pos + neg > 0.0 {
        out.insert("sentiment.polarity".to_string(), (pos - neg) / (pos + neg));
    }
    out
}

fn sarcasm_features(parse: &CompactParseResult) -> FeatureVector {
    let mut out = FeatureVector::new();
    if parse.sarcasm.present {
        out.insert("sarcasm.flag".to_string(), 1.0);
        out.insert("sarcasm.score".to_string(), parse.sarcasm.score);
    }
    out
}

/// Uppercase fraction among alphabetic characters; short texts don't count
/// ("OK" is not shouting).
fn caps_ratio(text: &str) -> f32 {
    let alpha: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.len() < 6 {
        return 0.0;
    }
    let upper = alpha.iter().filter(|c| c.is_uppercase()).count();
    let ratio = upper as f32 / alpha.len() as f32;
    if ratio >= 0.5 {
        ratio
    } else {
        0.0
    }
}

/// Three or more identical consecutive letters ("nooooo", "ughhh"),
/// case-insensitive.
fn has_letter_stretch(text: &str) -> bool {
    let mut prev = '\0';
    let mut run = 0u32;
    for c in text.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphabetic() && c == prev {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 1;
        }
        prev = c;
    }
    false
}

fn merge_scaled(into: &mut FeatureVector, from: FeatureVector, weight: f32) {
    for (key, value) in from {
        *into.entry(key).or_default() += value * weight;
    }
}
