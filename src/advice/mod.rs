// src/advice/mod.rs
// Learning-to-rank advice retrieval: a skip-if-empty filter cascade over
// the advice library followed by weighted linear scoring. Never returns an
// empty list — a generic reflective prompt backstops everything.

use crate::attachment::AttachmentStyle;
use crate::kb::{AdviceCandidate, KnowledgeBase, Tier, FALLBACK_SUGGESTION};
use crate::tone::buckets::{Bucket, BucketWeights};
use crate::tone::Tone;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

// Scoring weights for the linear combination. A single place to tune.
const W_BASE_CONFIDENCE: f32 = 1.0;
const W_BUCKET_MASS: f32 = 1.2;
const W_CONTEXT_MATCH: f32 = 0.5;
const W_ATTACHMENT_MATCH: f32 = 0.5;
const W_INTENSITY: f32 = 0.3;
const W_NEGATION_PENALTY: f32 = 0.4;
const W_SARCASM_PENALTY: f32 = 0.5;
const W_EDGE_HITS: f32 = 0.15;
const W_PREFERENCE_BOOST: f32 = 0.4;
const W_SEVERITY_FIT: f32 = 0.6;
const W_TIER_BOOST: f32 = 0.2;

/// Everything the ranker needs to know about one request.
#[derive(Debug, Clone)]
pub struct RankSignals {
    pub tone: Tone,
    pub buckets: BucketWeights,
    pub context: Option<String>,
    pub attachment: Option<AttachmentStyle>,
    pub intensity: f32,
    /// Smoothed (or raw) classification confidence.
    pub base_confidence: f32,
    pub negation: bool,
    pub sarcasm: bool,
    pub edge_hits: f32,
    /// Categories the user has responded well to before.
    pub preferred_categories: Vec<String>,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSuggestion {
    pub candidate_id: String,
    pub text: String,
    pub score: f32,
    pub category: String,
}

pub struct AdviceRanker {
    kb: Arc<KnowledgeBase>,
    max_suggestions: usize,
}

impl AdviceRanker {
    pub fn new(kb: Arc<KnowledgeBase>, max_suggestions: usize) -> Self {
        Self {
            kb,
            max_suggestions: max_suggestions.max(1),
        }
    }

    /// Filter, score, and return the top-N suggestions. Each filter stage
    /// that would empty the set is skipped so ranking always has material.
    pub fn rank(&self, signals: &RankSignals) -> Vec<RankedSuggestion> {
        let candidates: Vec<&AdviceCandidate> = self.kb.advice.iter().collect();

        let candidates = retain_or_keep(candidates, "tier", |c| {
            signals.tier == Tier::Premium || c.tier == Tier::General
        });

        let candidates = match &signals.context {
            Some(context) => retain_or_keep(candidates, "context", |c| {
                c.context_tags.iter().any(|t| t == context)
            }),
            None => candidates,
        };

        let dominant = signals.buckets.dominant();
        let candidates = retain_or_keep(candidates, "bucket", |c| c.bucket == dominant);

        let candidates = match signals.attachment {
            Some(style) => retain_or_keep(candidates, "attachment", |c| {
                c.attachment_tags.contains(&style)
            }),
            None => candidates,
        };

        let mut scored: Vec<(f32, &AdviceCandidate)> = candidates
            .into_iter()
            .map(|c| (self.score(c, signals, dominant), c))
            .collect();
        // Stable sort: ties keep library declaration order for determinism
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let ranked: Vec<RankedSuggestion> = scored
            .into_iter()
            .take(self.max_suggestions)
            .map(|(score, c)| RankedSuggestion {
                candidate_id: c.id.clone(),
                text: fill_template(&c.template, signals.tone),
                score,
                category: c.category.clone(),
            })
            .collect();

        if ranked.is_empty() {
            return vec![RankedSuggestion {
                candidate_id: "fallback-reflective".to_string(),
                text: FALLBACK_SUGGESTION.to_string(),
                score: 0.0,
                category: "reflection".to_string(),
            }];
        }
        ranked
    }

    fn score(&self, candidate: &AdviceCandidate, signals: &RankSignals, dominant: Bucket) -> f32 {
        let context_match = signals
            .context
            .as_ref()
            .map(|ctx| candidate.context_tags.iter().any(|t| t == ctx))
            .unwrap_or(false);
        let attachment_match = signals
            .attachment
            .map(|style| candidate.attachment_tags.contains(&style))
            .unwrap_or(false);
        let preferred = signals
            .preferred_categories
            .iter()
            .any(|c| *c == candidate.category);

        let severity_fit = {
            let baseline = severity_baseline(dominant, signals.context.as_deref());
            (1.0 - (candidate.severity.get(dominant) - baseline).abs()).clamp(0.0, 1.0)
        };

        let mut score = W_BASE_CONFIDENCE * signals.base_confidence
            + W_BUCKET_MASS * signals.buckets.get(candidate.bucket)
            + W_INTENSITY * signals.intensity
            + W_EDGE_HITS * signals.edge_hits.min(3.0)
            + W_SEVERITY_FIT * severity_fit;

        if context_match {
            score += W_CONTEXT_MATCH;
        }
        if attachment_match {
            score += W_ATTACHMENT_MATCH;
        }
        if preferred {
            score += W_PREFERENCE_BOOST;
        }
        if signals.negation {
            score -= W_NEGATION_PENALTY;
        }
        if signals.sarcasm {
            score -= W_SARCASM_PENALTY;
        }
        if signals.tier == Tier::Premium && candidate.tier == Tier::Premium {
            score += W_TIER_BOOST;
        }
        score
    }
}

/// Apply a filter stage unless it would empty the set, in which case keep
/// the wider set.
fn retain_or_keep<'a>(
    candidates: Vec<&'a AdviceCandidate>,
    stage: &str,
    keep: impl Fn(&AdviceCandidate) -> bool,
) -> Vec<&'a AdviceCandidate> {
    let filtered: Vec<&AdviceCandidate> = candidates.iter().copied().filter(|c| keep(c)).collect();
    if filtered.is_empty() {
        debug!(stage, "Filter stage would empty candidate set; skipping");
        candidates
    } else {
        filtered
    }
}

/// Expected severity threshold for a candidate well-matched to this bucket.
/// Conflict conversations run a little hotter across the board.
fn severity_baseline(bucket: Bucket, context: Option<&str>) -> f32 {
    let base: f32 = match bucket {
        Bucket::Clear => 0.25,
        Bucket::Caution => 0.55,
        Bucket::Alert => 0.80,
    };
    if context == Some("conflict") {
        (base + 0.05).min(1.0)
    } else {
        base
    }
}

fn fill_template(template: &str, tone: Tone) -> String {
    template.replace("{feeling}", tone.as_str())
}
