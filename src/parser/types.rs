// src/parser/types.rs
// Compact internal shape of the external linguistic parser's response.

use serde::{Deserialize, Serialize};

/// Which half of the keyboard round-trip this call serves. Typing calls are
/// interactive and run under a tight timeout; finalize calls may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsePhase {
    Typing,
    Finalize,
}

impl ParsePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsePhase::Typing => "typing",
            ParsePhase::Finalize => "finalize",
        }
    }

    pub fn is_finalize(&self) -> bool {
        matches!(self, ParsePhase::Finalize)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedToken {
    pub text: String,
    pub lemma: String,
    pub pos: String,
    pub i: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyArc {
    pub i: usize,
    pub head: Option<usize>,
    pub dep: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SarcasmSignal {
    pub present: bool,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSignal {
    pub label: String,
    pub score: f32,
}

impl Default for ContextSignal {
    fn default() -> Self {
        Self {
            label: "general".to_string(),
            score: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhraseEdgeHits {
    pub hits: Vec<String>,
}

/// Where a parse result came from. Fallback results are lower fidelity and
/// the feature extractor weights their sarcasm/context signals accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    External,
    Fallback,
}

/// Normalized parser output. The gateway guarantees one of these is always
/// produced, whatever happens to the external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactParseResult {
    #[serde(default)]
    pub tokens: Vec<ParsedToken>,
    #[serde(default)]
    pub sents: Vec<SentenceSpan>,
    #[serde(default)]
    pub deps: Vec<DependencyArc>,
    #[serde(default)]
    pub sarcasm: SarcasmSignal,
    #[serde(default)]
    pub context: ContextSignal,
    #[serde(default)]
    pub phrase_edges: PhraseEdgeHits,
    #[serde(default = "default_source")]
    pub source: ParseSource,
}

fn default_source() -> ParseSource {
    ParseSource::External
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_collaborator_shape() {
        // Exact shape the spaCy collaborator returns
        let raw = serde_json::json!({
            "tokens": [{"text": "Hi", "lemma": "hi", "pos": "INTJ", "i": 0}],
            "sents": [{"start": 0, "end": 2}],
            "deps": [{"i": 0, "head": null, "dep": "ROOT"}],
            "sarcasm": {"present": false, "score": 0.0},
            "context": {"label": "general", "score": 0.1},
            "phraseEdges": {"hits": []}
        });
        let parsed: CompactParseResult = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.tokens.len(), 1);
        assert_eq!(parsed.tokens[0].lemma, "hi");
        assert_eq!(parsed.source, ParseSource::External);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: CompactParseResult = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.tokens.is_empty());
        assert!(!parsed.sarcasm.present);
        assert_eq!(parsed.context.label, "general");
    }
}
