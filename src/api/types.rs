// src/api/types.rs
// Wire types for the analyze-and-suggest endpoint. Field names are
// camelCase to match the mobile clients.

use crate::attachment::AttachmentStyle;
use crate::kb::Tier;
use crate::services::AnalyzeOutcome;
use crate::tone::buckets::BucketWeights;
use crate::tone::safety::SafetyEscalation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_tier() -> Tier {
    Tier::General
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub attachment_style_hint: Option<AttachmentStyle>,
    #[serde(default)]
    pub context_hint: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_tier")]
    pub tier: Tier,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionDto {
    pub text: String,
    pub category: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneDto {
    pub classification: String,
    pub confidence: f32,
    pub distribution: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub suggestions: Vec<SuggestionDto>,
    pub tone: ToneDto,
    pub tone_buckets: BucketWeights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_escalation: Option<SafetyEscalation>,
}

impl From<AnalyzeOutcome> for AnalyzeResponse {
    fn from(outcome: AnalyzeOutcome) -> Self {
        // Suggestion confidence rides the (smoothed) tone confidence; the
        // raw ranking score is an internal ordering signal, not a
        // probability.
        let confidence = outcome
            .smoothed
            .as_ref()
            .map(|s| s.confidence)
            .unwrap_or(outcome.tone.confidence);

        let suggestions = outcome
            .suggestions
            .into_iter()
            .map(|s| SuggestionDto {
                text: s.text,
                category: s.category,
                confidence,
            })
            .collect();

        let distribution = outcome
            .tone
            .distribution
            .iter()
            .map(|(tone, p)| (tone.as_str().to_string(), *p))
            .collect();

        let classification = match &outcome.smoothed {
            Some(smoothed) if !outcome.tone.is_safety() => smoothed.tone.as_str().to_string(),
            _ => outcome.tone.classification.clone(),
        };

        Self {
            suggestions,
            tone: ToneDto {
                classification,
                confidence,
                distribution,
            },
            tone_buckets: outcome.buckets,
            safety_escalation: outcome.tone.escalation,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub parser_circuit_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_minimal_payload() {
        let req: AnalyzeRequest = serde_json::from_value(serde_json::json!({
            "text": "hello",
            "userId": "u1"
        }))
        .unwrap();
        assert_eq!(req.tier, Tier::General);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_request_parses_full_payload() {
        let req: AnalyzeRequest = serde_json::from_value(serde_json::json!({
            "text": "hello",
            "userId": "u1",
            "attachmentStyleHint": "avoidant",
            "contextHint": "conflict",
            "sessionId": "s1",
            "tier": "premium",
            "preferredCategories": ["pause"]
        }))
        .unwrap();
        assert_eq!(req.attachment_style_hint, Some(AttachmentStyle::Avoidant));
        assert_eq!(req.tier, Tier::Premium);
    }
}
