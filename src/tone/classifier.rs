// src/tone/classifier.rs
// Weighted-ensemble tone scoring with softmax normalization, margin-based
// confidence calibration, attachment-style bias, and the safety override.

use crate::attachment::AttachmentStyle;
use crate::config::TonebridgeConfig;
use crate::error::AnalysisError;
use crate::features::FeatureVector;
use crate::tone::safety::{SafetyCheck, SafetyEscalation};
use crate::tone::{Tone, ToneDistribution};
use serde::{Deserialize, Serialize};

pub const SAFETY_CLASSIFICATION: &str = "safety_concern";
const SAFETY_CONFIDENCE: f32 = 0.97;
/// Prior that keeps neutral on top when nothing emotional fired.
const NEUTRAL_PRIOR: f32 = 0.55;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneResult {
    /// A tone label, or `safety_concern` when the override fired.
    pub classification: String,
    pub confidence: f32,
    pub distribution: ToneDistribution,
    /// Gap between the top two post-softmax probabilities.
    pub margin: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<SafetyEscalation>,
}

impl ToneResult {
    pub fn primary_tone(&self) -> Option<Tone> {
        Tone::parse(&self.classification)
    }

    pub fn is_safety(&self) -> bool {
        self.escalation.is_some()
    }

    fn safety(escalation: SafetyEscalation) -> Self {
        let mut distribution = ToneDistribution::new();
        // The advisory branch carries no tone estimate; park the mass on
        // neutral so the distribution invariant (sums to 1) still holds.
        for tone in Tone::ALL {
            distribution.insert(tone, if tone == Tone::Neutral { 1.0 } else { 0.0 });
        }
        Self {
            classification: SAFETY_CLASSIFICATION.to_string(),
            confidence: SAFETY_CONFIDENCE,
            distribution,
            margin: 1.0,
            escalation: Some(escalation),
        }
    }
}

pub struct ToneClassifier {
    temperature: f32,
    confidence_floor: f32,
    confidence_ceiling: f32,
    max_text_chars: usize,
}

impl ToneClassifier {
    pub fn from_config(config: &TonebridgeConfig) -> Self {
        Self {
            temperature: config.softmax_temperature.max(0.1),
            confidence_floor: config.confidence_floor,
            confidence_ceiling: config.confidence_ceiling,
            max_text_chars: config.max_text_chars,
        }
    }

    /// Classify one message. Fails only on invalid input; unsupported
    /// language degrades to a neutral low-confidence result.
    pub fn classify(
        &self,
        features: &FeatureVector,
        text: &str,
        attachment_hint: Option<AttachmentStyle>,
    ) -> Result<ToneResult, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("text is empty".to_string()));
        }
        if text.chars().count() > self.max_text_chars {
            return Err(AnalysisError::InvalidInput(format!(
                "text exceeds {} characters",
                self.max_text_chars
            )));
        }

        if let Some(escalation) = SafetyCheck::check(text) {
            return Ok(ToneResult::safety(escalation));
        }

        if !looks_like_target_language(text) {
            return Ok(self.neutral_fallback());
        }

        let mut raw: Vec<(Tone, f32)> = Tone::ALL
            .iter()
            .map(|tone| (*tone, raw_score(*tone, features)))
            .collect();

        if let Some(style) = attachment_hint {
            for (tone, score) in &mut raw {
                *score *= style_bias(style, *tone);
            }
        }

        let distribution = softmax(&raw, self.temperature);
        let (top_tone, top_p, second_p) = top_two(&distribution);
        let margin = (top_p - second_p).max(0.0);
        let confidence =
            (top_p * (0.5 + margin)).clamp(self.confidence_floor, self.confidence_ceiling);

        Ok(ToneResult {
            classification: top_tone.as_str().to_string(),
            confidence,
            distribution,
            margin,
            escalation: None,
        })
    }

    /// Neutral low-confidence result for non-target-language text; the
    /// full ensemble never runs.
    fn neutral_fallback(&self) -> ToneResult {
        let raw: Vec<(Tone, f32)> = Tone::ALL
            .iter()
            .map(|tone| (*tone, if *tone == Tone::Neutral { 1.0 } else { 0.0 }))
            .collect();
        let distribution = softmax(&raw, 2.0);
        ToneResult {
            classification: Tone::Neutral.as_str().to_string(),
            confidence: self.confidence_floor,
            distribution,
            margin: 0.0,
            escalation: None,
        }
    }
}

/// Weighted sum over the feature keys designated for each tone label.
fn raw_score(tone: Tone, features: &FeatureVector) -> f32 {
    let f = |key: &str| features.get(key).copied().unwrap_or(0.0);
    let emotion = f(&format!("emotion.{tone}"));
    let polarity = f("sentiment.polarity");

    match tone {
        Tone::Neutral => NEUTRAL_PRIOR + 0.2 * f("intensity.dampeners"),
        Tone::Supportive => emotion + 0.5 * f("para.emoji_pos") + 0.5 * polarity.max(0.0),
        Tone::Anxious => emotion + 0.25 * f("para.question") + 0.45 * f("attach.anxious"),
        Tone::Angry => {
            emotion
                + 0.30 * f("para.exclaim")
                + 1.10 * f("para.caps_ratio")
                + 0.35 * f("para.emoji_neg")
                + 0.30 * f("edges.absolutes")
                + 0.30 * f("edges.blame")
                + 0.40 * (-polarity).max(0.0)
        }
        Tone::Frustrated => {
            emotion + 0.20 * f("para.exclaim") + 0.30 * f("para.stretch") + 0.25 * f("edges.hits")
        }
        Tone::Sad => emotion + 0.30 * f("para.ellipsis") + 0.30 * f("para.emoji_neg"),
        Tone::Withdrawn => {
            emotion
                + 0.35 * f("para.ellipsis")
                + 0.45 * f("attach.avoidant")
                + 0.45 * f("sarcasm.flag")
                + 0.30 * f("edges.dismissal")
                + 0.30 * f("edges.shutdown")
        }
        Tone::Assertive => emotion + 0.25 * f("complexity.avg_sentence_len"),
    }
}

/// Attachment styles reweight emotion categories differently: an avoidant
/// author's flat affect reads more withdrawn, an anxious author's questions
/// read more anxious, and so on.
fn style_bias(style: AttachmentStyle, tone: Tone) -> f32 {
    match (style, tone) {
        (AttachmentStyle::Anxious, Tone::Anxious) => 1.20,
        (AttachmentStyle::Anxious, Tone::Sad) => 1.10,
        (AttachmentStyle::Anxious, Tone::Neutral) => 0.95,
        (AttachmentStyle::Avoidant, Tone::Withdrawn) => 1.25,
        (AttachmentStyle::Avoidant, Tone::Neutral) => 1.10,
        (AttachmentStyle::Avoidant, Tone::Anxious) => 0.90,
        (AttachmentStyle::Disorganized, Tone::Angry) => 1.15,
        (AttachmentStyle::Disorganized, Tone::Anxious) => 1.15,
        (AttachmentStyle::Disorganized, Tone::Sad) => 1.10,
        (AttachmentStyle::Secure, Tone::Supportive) => 1.15,
        (AttachmentStyle::Secure, Tone::Assertive) => 1.10,
        (AttachmentStyle::Secure, Tone::Angry) => 0.90,
        _ => 1.0,
    }
}

/// Temperature softmax; T > 1 flattens the distribution so near-ties don't
/// masquerade as certainty.
fn softmax(raw: &[(Tone, f32)], temperature: f32) -> ToneDistribution {
    let max = raw
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<(Tone, f32)> = raw
        .iter()
        .map(|(tone, s)| (*tone, ((s - max) / temperature).exp()))
        .collect();
    let sum: f32 = exps.iter().map(|(_, e)| e).sum();
    exps.into_iter().map(|(tone, e)| (tone, e / sum)).collect()
}

fn top_two(distribution: &ToneDistribution) -> (Tone, f32, f32) {
    let mut best = (Tone::Neutral, f32::NEG_INFINITY);
    let mut second = f32::NEG_INFINITY;
    for (tone, p) in distribution {
        if *p > best.1 {
            second = best.1;
            best = (*tone, *p);
        } else if *p > second {
            second = *p;
        }
    }
    (best.0, best.1, second.max(0.0))
}

fn looks_like_target_language(text: &str) -> bool {
    let alpha: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.is_empty() {
        return false;
    }
    let ascii = alpha.iter().filter(|c| c.is_ascii_alphabetic()).count();
    ascii as f32 / alpha.len() as f32 >= 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::kb::KnowledgeBase;
    use crate::parser::fallback::FallbackAnalyzer;
    use std::sync::Arc;

    fn classifier() -> ToneClassifier {
        ToneClassifier::from_config(&TonebridgeConfig::from_env())
    }

    fn classify(text: &str, hint: Option<AttachmentStyle>) -> ToneResult {
        let kb = Arc::new(KnowledgeBase::builtin());
        let parse = FallbackAnalyzer::new().analyze(text);
        let features = FeatureExtractor::new(kb).extract(text, &parse);
        classifier().classify(&features, text, hint).unwrap()
    }

    fn assert_valid(result: &ToneResult) {
        let sum: f32 = result.distribution.values().sum();
        assert!((sum - 1.0).abs() < 1e-4, "distribution sum {sum}");
        assert!(result.distribution.values().all(|p| *p >= 0.0));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((0.0..=1.0).contains(&result.margin));
    }

    #[test]
    fn test_empty_text_is_invalid() {
        let err = classifier()
            .classify(&FeatureVector::new(), "   ", None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_over_length_text_is_invalid() {
        let long = "a".repeat(2001);
        let err = classifier()
            .classify(&FeatureVector::new(), &long, None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_dismissive_message_reads_withdrawn() {
        let result = classify("I'm fine, whatever", None);
        assert_valid(&result);
        assert_eq!(result.classification, "withdrawn");
        assert!(result.confidence >= 0.15);
    }

    #[test]
    fn test_angry_message() {
        let result = classify("I HATE how you always do this!!!", None);
        assert_valid(&result);
        assert_eq!(result.classification, "angry");
    }

    #[test]
    fn test_plain_message_is_neutral() {
        let result = classify("See you at dinner, on my way now", None);
        assert_valid(&result);
        assert_eq!(result.classification, "neutral");
    }

    #[test]
    fn test_safety_override_short_circuits() {
        let result = classify("I just want to end it all", None);
        assert_valid(&result);
        assert_eq!(result.classification, SAFETY_CLASSIFICATION);
        assert!(result.is_safety());
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn test_non_target_language_neutral_fallback() {
        let result = classify("Это сообщение написано по-русски", None);
        assert_valid(&result);
        assert_eq!(result.classification, "neutral");
        assert!(result.confidence <= 0.2);
    }

    #[test]
    fn test_avoidant_hint_biases_toward_withdrawn() {
        let plain = classify("fine, it doesn't matter", None);
        let hinted = classify("fine, it doesn't matter", Some(AttachmentStyle::Avoidant));
        let plain_w = plain.distribution[&Tone::Withdrawn];
        let hinted_w = hinted.distribution[&Tone::Withdrawn];
        assert!(hinted_w >= plain_w);
    }

    #[test]
    fn test_near_tie_reports_low_confidence() {
        // Empty features: everything rides the neutral prior through a
        // flat softmax, so margin is small and confidence stays modest
        let result = classifier()
            .classify(&FeatureVector::new(), "hello there friend", None)
            .unwrap();
        assert_valid(&result);
        assert!(result.margin < 0.25);
        assert!(result.confidence < 0.6);
    }

    #[test]
    fn test_margin_confidence_relationship() {
        // Confidence can never exceed top probability times 1.5
        let result = classify("I'm so furious and angry, I hate this!!!", None);
        let top = result
            .distribution
            .values()
            .cloned()
            .fold(f32::NEG_INFINITY, f32::max);
        assert!(result.confidence <= (top * 1.5).min(0.95) + 1e-5);
    }
}
