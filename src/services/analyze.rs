// src/services/analyze.rs
// Orchestrates one analyze-and-suggest request: parse → features →
// classify → smooth → buckets → rank. The attachment learner runs off this
// path as a fire-and-forget task.

use crate::advice::{AdviceRanker, RankSignals, RankedSuggestion};
use crate::attachment::{AttachmentLearner, AttachmentStyle};
use crate::config::TonebridgeConfig;
use crate::error::AnalysisError;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::kb::{KnowledgeBase, Tier};
use crate::parser::types::ParsePhase;
use crate::parser::ParserGateway;
use crate::tone::buckets::BucketWeights;
use crate::tone::classifier::{ToneClassifier, ToneResult};
use crate::tone::smoother::{SmoothedTone, ToneSmoother};
use crate::tone::{Tone, ToneBucketMapper};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Attachment estimates below this confidence are not used as a hint.
const HINT_MIN_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub text: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub attachment_hint: Option<AttachmentStyle>,
    pub context_hint: Option<String>,
    pub tier: Tier,
    pub preferred_categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub tone: ToneResult,
    pub smoothed: Option<SmoothedTone>,
    pub buckets: BucketWeights,
    pub suggestions: Vec<RankedSuggestion>,
}

pub struct AnalyzeService {
    gateway: Arc<ParserGateway>,
    extractor: FeatureExtractor,
    classifier: ToneClassifier,
    smoother: Arc<ToneSmoother>,
    mapper: ToneBucketMapper,
    ranker: AdviceRanker,
    learner: Arc<AttachmentLearner>,
    max_text_chars: usize,
}

impl AnalyzeService {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        gateway: Arc<ParserGateway>,
        learner: Arc<AttachmentLearner>,
        config: &TonebridgeConfig,
    ) -> Self {
        Self {
            gateway,
            extractor: FeatureExtractor::new(kb.clone()),
            classifier: ToneClassifier::from_config(config),
            smoother: Arc::new(ToneSmoother::from_config(config)),
            mapper: ToneBucketMapper::new(kb.bucket_tables.clone()),
            ranker: AdviceRanker::new(kb, config.max_suggestions),
            learner,
            max_text_chars: config.max_text_chars,
        }
    }

    pub async fn analyze(&self, input: AnalyzeInput) -> Result<AnalyzeOutcome, AnalysisError> {
        // Fail fast before any pipeline work
        if input.text.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("text is empty".to_string()));
        }
        if input.text.chars().count() > self.max_text_chars {
            return Err(AnalysisError::InvalidInput(format!(
                "text exceeds {} characters",
                self.max_text_chars
            )));
        }

        let parse = self.gateway.process(&input.text, ParsePhase::Finalize).await;
        let features = self.extractor.extract(&input.text, &parse);

        let hint = match input.attachment_hint {
            Some(style) => Some(style),
            None => self.learned_hint(&input.user_id).await,
        };

        let tone = self.classifier.classify(&features, &input.text, hint)?;

        if let Some(escalation) = tone.escalation.clone() {
            // Priority branch: no smoothing, no ranking, no learning from
            // crisis text.
            info!(user_id = %input.user_id, "Safety escalation triggered");
            return Ok(AnalyzeOutcome {
                buckets: BucketWeights::new(0.0, 0.0, 1.0),
                suggestions: vec![RankedSuggestion {
                    candidate_id: format!("safety-{}", escalation.kind.as_str()),
                    text: escalation.message.clone(),
                    score: tone.confidence,
                    category: "safety".to_string(),
                }],
                smoothed: None,
                tone,
            });
        }

        self.spawn_learner_update(&input.user_id, &input.text);

        let raw_tone = tone.primary_tone().unwrap_or(Tone::Neutral);
        let smoothed = match &input.session_id {
            Some(session_id) => Some(
                self.smoother
                    .smooth(session_id, raw_tone, tone.confidence, Utc::now().timestamp_millis())
                    .await,
            ),
            None => None,
        };

        let (final_tone, final_confidence) = match &smoothed {
            Some(s) => (s.tone, s.confidence),
            None => (raw_tone, tone.confidence),
        };

        let context = input
            .context_hint
            .clone()
            .or_else(|| dominant_context(&features));
        let intensity = features.get("intensity.score").copied().unwrap_or(0.4);

        let buckets = self.mapper.map(final_tone, context.as_deref(), intensity);

        let signals = RankSignals {
            tone: final_tone,
            buckets,
            context,
            attachment: hint,
            intensity,
            base_confidence: final_confidence,
            negation: features.contains_key("negation.flag"),
            sarcasm: features.contains_key("sarcasm.flag"),
            edge_hits: features.get("edges.hits").copied().unwrap_or(0.0),
            preferred_categories: input.preferred_categories.clone(),
            tier: input.tier,
        };
        let suggestions = self.ranker.rank(&signals);

        info!(
            user_id = %input.user_id,
            tone = %final_tone,
            confidence = final_confidence,
            suggestions = suggestions.len(),
            "Message analyzed"
        );

        Ok(AnalyzeOutcome {
            tone,
            smoothed,
            buckets,
            suggestions,
        })
    }

    /// Reset a session's smoothing state (keyboard dismissed, new draft).
    pub async fn reset_session(&self, session_id: &str) {
        self.smoother.reset(session_id).await;
    }

    async fn learned_hint(&self, user_id: &str) -> Option<AttachmentStyle> {
        match self.learner.estimate(user_id).await {
            Ok(estimate) if estimate.confidence >= HINT_MIN_CONFIDENCE => estimate.primary,
            Ok(_) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Attachment estimate unavailable");
                None
            }
        }
    }

    /// Fire-and-forget profile update; a failure here never affects the
    /// request that carried the text.
    fn spawn_learner_update(&self, user_id: &str, text: &str) {
        let learner = self.learner.clone();
        let user_id = user_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            if let Err(e) = learner.update_from_text(&user_id, &text).await {
                warn!(user_id = %user_id, error = %e, "Attachment learner update failed");
            }
        });
    }
}

/// Strongest `context.*` feature, if any.
fn dominant_context(features: &FeatureVector) -> Option<String> {
    features
        .iter()
        .filter(|(key, _)| key.starts_with("context."))
        .max_by(|a, b| a.1.total_cmp(b.1))
        .filter(|(_, weight)| **weight > 0.0)
        .map(|(key, _)| key.trim_start_matches("context.").to_string())
}
