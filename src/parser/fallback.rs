// src/parser/fallback.rs
// Local heuristic analyzer used when the external parser is disabled,
// timed out, or behind an open circuit. Lower fidelity, always available.

use crate::parser::types::{
    CompactParseResult, ContextSignal, ParsedToken, ParseSource, PhraseEdgeHits, SarcasmSignal,
    SentenceSpan,
};
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)?|\d+|[^\sA-Za-z\d]").expect("token regex"));

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s*").expect("sentence regex"));

static SARCASM_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(yeah,? right|sure,? (?:sure|whatever)|oh,? (?:great|wonderful|perfect)|thanks a lot)\b")
        .expect("sarcasm regex")
});

const PRONOUNS: &[&str] = &[
    "i", "me", "my", "you", "your", "we", "us", "our", "he", "him", "she", "her", "they", "them",
    "it",
];

pub struct FallbackAnalyzer;

impl FallbackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Regex tokenizer with rough POS hints. No dependency arcs; sarcasm is
    /// cue-based; context stays at the generic default the collaborator
    /// would give for unrecognized text.
    pub fn analyze(&self, text: &str) -> CompactParseResult {
        let tokens: Vec<ParsedToken> = TOKEN_RE
            .find_iter(text)
            .enumerate()
            .map(|(i, m)| {
                let word = m.as_str();
                ParsedToken {
                    text: word.to_string(),
                    lemma: word.to_ascii_lowercase(),
                    pos: guess_pos(word).to_string(),
                    i,
                }
            })
            .collect();

        let sents = split_sentences(text);

        let sarcasm = if SARCASM_CUE_RE.is_match(text) {
            SarcasmSignal {
                present: true,
                score: 0.6,
            }
        } else {
            SarcasmSignal::default()
        };

        CompactParseResult {
            tokens,
            sents,
            deps: Vec::new(),
            sarcasm,
            context: ContextSignal::default(),
            phrase_edges: PhraseEdgeHits::default(),
            source: ParseSource::Fallback,
        }
    }
}

impl Default for FallbackAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn guess_pos(word: &str) -> &'static str {
    let lower = word.to_ascii_lowercase();
    if word.chars().all(|c| !c.is_alphanumeric()) {
        "PUNCT"
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        "NUM"
    } else if PRONOUNS.contains(&lower.as_str()) {
        "PRON"
    } else if lower.ends_with("ing") || lower.ends_with("ed") {
        "VERB"
    } else if lower.ends_with("ly") {
        "ADV"
    } else {
        "X"
    }
}

fn split_sentences(text: &str) -> Vec<SentenceSpan> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut spans = Vec::new();
    let mut start = 0usize;
    for m in SENTENCE_END_RE.find_iter(text) {
        if m.start() > start {
            spans.push(SentenceSpan {
                start,
                end: m.start() + trailing_punct_len(&text[m.start()..m.end()]),
            });
        }
        start = m.end();
    }
    if start < text.len() {
        spans.push(SentenceSpan {
            start,
            end: text.len(),
        });
    }
    if spans.is_empty() {
        spans.push(SentenceSpan {
            start: 0,
            end: text.len(),
        });
    }
    spans
}

fn trailing_punct_len(segment: &str) -> usize {
    segment.trim_end().len()
}
