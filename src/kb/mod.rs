// src/kb/mod.rs
// Static knowledge bases: lexicons, signal tables, bucket tables, and the
// advice library. Loaded once at startup from JSON files; a missing or
// malformed file degrades to a compiled-in default instead of failing the
// service.

pub mod defaults;

pub use defaults::FALLBACK_SUGGESTION;

use crate::attachment::AttachmentStyle;
use crate::tone::buckets::{Bucket, BucketWeights};
use crate::tone::Tone;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// File schemas (validated once at load, then compiled to runtime tables)
// ---------------------------------------------------------------------------

/// One emotion lexicon entry: a word or short phrase that signals a tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub term: String,
    pub tone: Tone,
    pub weight: f32,
}

/// Keywords that suggest a conversational context (conflict, repair, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRule {
    pub context: String,
    pub keywords: Vec<String>,
    pub weight: f32,
}

/// Lexical markers associated with one attachment style, used both by the
/// feature extractor (substring match) and, in regex form, by the learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRule {
    pub style: AttachmentStyle,
    pub patterns: Vec<String>,
    pub weight: f32,
}

/// Intensity modifier: multiplies the running intensity estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntensityModifier {
    pub term: String,
    pub factor: f32,
}

/// Curated phrase-edge pattern ("you always ...", "i'm done", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseEdgeRule {
    pub label: String,
    pub pattern: String,
    pub weight: f32,
}

/// Advice library tier. General is available to everyone; the full library
/// requires a premium entitlement (resolved upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    General,
    Premium,
}

/// One advice template, read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceCandidate {
    pub id: String,
    pub template: String,
    /// The severity bucket this suggestion is written for.
    pub bucket: Bucket,
    #[serde(default)]
    pub context_tags: Vec<String>,
    #[serde(default)]
    pub attachment_tags: Vec<AttachmentStyle>,
    /// Per-bucket severity thresholds; ranking rewards candidates whose
    /// threshold sits close to the request's severity baseline.
    pub severity: BucketWeights,
    pub category: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BucketOverride {
    pub(crate) context: String,
    pub(crate) tone: Tone,
    pub(crate) weights: BucketWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BucketFile {
    pub(crate) base: BTreeMap<Tone, BucketWeights>,
    #[serde(default)]
    pub(crate) overrides: Vec<BucketOverride>,
    /// Intensity below `low_threshold` selects the low shift, above
    /// `high_threshold` the high shift, otherwise the medium shift.
    pub(crate) low_threshold: f32,
    pub(crate) high_threshold: f32,
    pub(crate) shift_low: BucketWeights,
    pub(crate) shift_medium: BucketWeights,
    pub(crate) shift_high: BucketWeights,
}

// ---------------------------------------------------------------------------
// Runtime tables
// ---------------------------------------------------------------------------

/// Base distributions, context overrides and intensity shifts for the
/// tone→bucket mapper.
#[derive(Debug)]
pub struct BucketTables {
    base: BTreeMap<Tone, BucketWeights>,
    overrides: HashMap<(String, Tone), BucketWeights>,
    low_threshold: f32,
    high_threshold: f32,
    shift_low: BucketWeights,
    shift_medium: BucketWeights,
    shift_high: BucketWeights,
}

impl BucketTables {
    pub fn base_for(&self, tone: Tone) -> BucketWeights {
        self.base
            .get(&tone)
            .copied()
            // Missing tone row: neutral-leaning default
            .unwrap_or_else(|| BucketWeights::new(0.7, 0.25, 0.05))
    }

    pub fn override_for(&self, context: Option<&str>, tone: Tone) -> Option<BucketWeights> {
        let context = context?;
        self.overrides
            .get(&(context.to_ascii_lowercase(), tone))
            .copied()
    }

    pub fn intensity_shift(&self, intensity: f32) -> BucketWeights {
        if intensity < self.low_threshold {
            self.shift_low
        } else if intensity > self.high_threshold {
            self.shift_high
        } else {
            self.shift_medium
        }
    }

    fn from_file(file: BucketFile) -> Self {
        let overrides = file
            .overrides
            .into_iter()
            .map(|o| ((o.context.to_ascii_lowercase(), o.tone), o.weights))
            .collect();
        Self {
            base: file.base,
            overrides,
            low_threshold: file.low_threshold,
            high_threshold: file.high_threshold,
            shift_low: file.shift_low,
            shift_medium: file.shift_medium,
            shift_high: file.shift_high,
        }
    }
}

/// An attachment signal rule with its patterns compiled to regexes.
#[derive(Debug)]
pub struct CompiledSignal {
    pub style: AttachmentStyle,
    pub regexes: Vec<Regex>,
    pub weight: f32,
}

/// A phrase-edge rule with its pattern compiled.
#[derive(Debug)]
pub struct CompiledEdge {
    pub label: String,
    pub regex: Regex,
    pub weight: f32,
}

/// All startup-loaded tables, shared read-only across requests.
pub struct KnowledgeBase {
    /// Lowercased term → (tone, weight) hits.
    pub emotion_lexicon: HashMap<String, Vec<(Tone, f32)>>,
    pub context_rules: Vec<ContextRule>,
    /// Lexical attachment markers for the feature extractor.
    pub attachment_markers: Vec<SignalRule>,
    /// Regex signals for the multi-day attachment learner.
    pub attachment_signals: Vec<CompiledSignal>,
    pub intensity_modifiers: HashMap<String, f32>,
    pub phrase_edges: Vec<CompiledEdge>,
    pub bucket_tables: Arc<BucketTables>,
    pub advice: Vec<AdviceCandidate>,
}

impl KnowledgeBase {
    /// Load every knowledge base file from `dir`. Each file that is missing
    /// or malformed logs a warning and falls back to the compiled-in
    /// default; the service always starts.
    pub fn load(dir: &Path) -> Self {
        let lexicon_entries: Vec<LexiconEntry> =
            load_section(dir, "emotion_lexicon.json", defaults::emotion_lexicon);
        let context_rules: Vec<ContextRule> =
            load_section(dir, "context_keywords.json", defaults::context_rules);
        let attachment_markers: Vec<SignalRule> =
            load_section(dir, "attachment_markers.json", defaults::attachment_markers);
        let signal_rules: Vec<SignalRule> =
            load_section(dir, "attachment_signals.json", defaults::attachment_signals);
        let intensity: Vec<IntensityModifier> =
            load_section(dir, "intensity_modifiers.json", defaults::intensity_modifiers);
        let edge_rules: Vec<PhraseEdgeRule> =
            load_section(dir, "phrase_edges.json", defaults::phrase_edges);
        let bucket_file: BucketFile =
            load_section(dir, "tone_buckets.json", defaults::bucket_file);
        let advice: Vec<AdviceCandidate> =
            load_section(dir, "advice.json", defaults::advice_candidates);

        let kb = Self::assemble(
            lexicon_entries,
            context_rules,
            attachment_markers,
            signal_rules,
            intensity,
            edge_rules,
            bucket_file,
            advice,
        );
        info!(
            lexicon = kb.emotion_lexicon.len(),
            advice = kb.advice.len(),
            signals = kb.attachment_signals.len(),
            "Knowledge base loaded"
        );
        kb
    }

    /// Knowledge base built entirely from compiled-in defaults.
    pub fn builtin() -> Self {
        Self::assemble(
            defaults::emotion_lexicon(),
            defaults::context_rules(),
            defaults::attachment_markers(),
            defaults::attachment_signals(),
            defaults::intensity_modifiers(),
            defaults::phrase_edges(),
            defaults::bucket_file(),
            defaults::advice_candidates(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        lexicon_entries: Vec<LexiconEntry>,
        context_rules: Vec<ContextRule>,
        attachment_markers: Vec<SignalRule>,
        signal_rules: Vec<SignalRule>,
        intensity: Vec<IntensityModifier>,
        edge_rules: Vec<PhraseEdgeRule>,
        bucket_file: BucketFile,
        advice: Vec<AdviceCandidate>,
    ) -> Self {
        let mut emotion_lexicon: HashMap<String, Vec<(Tone, f32)>> = HashMap::new();
        for entry in lexicon_entries {
            emotion_lexicon
                .entry(entry.term.to_ascii_lowercase())
                .or_default()
                .push((entry.tone, entry.weight));
        }

        let attachment_signals = signal_rules
            .into_iter()
            .map(|rule| {
                let regexes = rule
                    .patterns
                    .iter()
                    .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!(pattern = %p, error = %e, "Skipping invalid attachment signal pattern");
                            None
                        }
                    })
                    .collect();
                CompiledSignal {
                    style: rule.style,
                    regexes,
                    weight: rule.weight,
                }
            })
            .collect();

        let phrase_edges = edge_rules
            .into_iter()
            .filter_map(|rule| match Regex::new(&format!("(?i){}", rule.pattern)) {
                Ok(regex) => Some(CompiledEdge {
                    label: rule.label,
                    regex,
                    weight: rule.weight,
                }),
                Err(e) => {
                    warn!(pattern = %rule.pattern, error = %e, "Skipping invalid phrase edge pattern");
                    None
                }
            })
            .collect();

        let intensity_modifiers = intensity
            .into_iter()
            .map(|m| (m.term.to_ascii_lowercase(), m.factor))
            .collect();

        Self {
            emotion_lexicon,
            context_rules,
            attachment_markers,
            attachment_signals,
            intensity_modifiers,
            phrase_edges,
            bucket_tables: Arc::new(BucketTables::from_file(bucket_file)),
            advice,
        }
    }
}

/// Read and parse one knowledge base file, degrading to `default` on any
/// failure. Config load failures are never fatal.
fn load_section<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &str,
    default: fn() -> T,
) -> T {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<T>(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Malformed knowledge base file, using built-in default");
                default()
            }
        },
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Knowledge base file not readable, using built-in default");
            default()
        }
    }
}
