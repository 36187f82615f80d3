// src/tone/safety.rs
// Crisis language detection. A hit short-circuits normal classification and
// returns a fixed advisory instead of ranked suggestions. The pattern set
// is deliberately fixed in code, not in the knowledge base.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationType {
    SelfHarm,
    Violence,
    Legal,
    Medical,
}

impl EscalationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationType::SelfHarm => "self_harm",
            EscalationType::Violence => "violence",
            EscalationType::Legal => "legal",
            EscalationType::Medical => "medical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEscalation {
    #[serde(rename = "type")]
    pub kind: EscalationType,
    pub message: String,
}

struct CrisisRule {
    kind: EscalationType,
    regex: Regex,
    message: &'static str,
}

static CRISIS_RULES: Lazy<Vec<CrisisRule>> = Lazy::new(|| {
    let rule = |kind, pattern: &str, message| CrisisRule {
        kind,
        regex: Regex::new(&format!("(?i){pattern}")).expect("crisis pattern"),
        message,
    };
    vec![
        rule(
            EscalationType::SelfHarm,
            r"\b(kill(ing)? myself|end(ing)? (it all|my life)|don'?t want to (live|be here)|hurt(ing)? myself|suicid\w*|self[- ]?harm)\b",
            "It sounds like you may be going through something serious. Please reach out to someone you trust or a crisis line — in the US you can call or text 988.",
        ),
        rule(
            EscalationType::Violence,
            r"\b(hurt (him|her|them|you)|going to (hit|hurt|kill)|make (him|her|them) pay|i could kill)\b",
            "This message mentions harming someone. Please step away from the conversation and talk to a professional before sending anything.",
        ),
        rule(
            EscalationType::Legal,
            r"\b(restraining order|call(ing)? the police|press(ing)? charges|file a report|lawyer up)\b",
            "This situation may have legal dimensions. Consider speaking with a qualified professional before continuing this conversation.",
        ),
        rule(
            EscalationType::Medical,
            r"\b(overdos\w*|can'?t breathe|chest pains?|passed out|emergency room)\b",
            "This sounds like it could be a medical emergency. If anyone is in danger, contact emergency services right away.",
        ),
    ]
});

/// Stateless matcher over the fixed crisis pattern set.
pub struct SafetyCheck;

impl SafetyCheck {
    /// First matching rule wins; rules are ordered by severity.
    pub fn check(text: &str) -> Option<SafetyEscalation> {
        CRISIS_RULES.iter().find_map(|rule| {
            rule.regex.is_match(text).then(|| SafetyEscalation {
                kind: rule.kind,
                message: rule.message.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_harm_detected() {
        let esc = SafetyCheck::check("sometimes I just want to end it all").unwrap();
        assert_eq!(esc.kind, EscalationType::SelfHarm);
        assert!(!esc.message.is_empty());
    }

    #[test]
    fn test_violence_detected() {
        let esc = SafetyCheck::check("I'm going to hurt him if he shows up").unwrap();
        assert_eq!(esc.kind, EscalationType::Violence);
    }

    #[test]
    fn test_ordinary_anger_is_not_crisis() {
        assert!(SafetyCheck::check("I'm so angry I could scream").is_none());
        assert!(SafetyCheck::check("this killed my mood").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(SafetyCheck::check("I CAN'T BREATHE when you yell").is_some());
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_value(EscalationType::SelfHarm).unwrap();
        assert_eq!(json, serde_json::json!("self_harm"));
    }
}
