// src/tone/mod.rs
// Tone vocabulary and classification result types shared across the pipeline.

pub mod buckets;
pub mod classifier;
pub mod safety;
pub mod smoother;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use buckets::{BucketWeights, ToneBucketMapper};
pub use classifier::{ToneClassifier, ToneResult};
pub use safety::{SafetyCheck, SafetyEscalation};
pub use smoother::{SmoothedTone, ToneSmoother};

/// Fixed emotion/tone vocabulary scored by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Neutral,
    Supportive,
    Anxious,
    Angry,
    Frustrated,
    Sad,
    Withdrawn,
    Assertive,
}

impl Tone {
    pub const ALL: [Tone; 8] = [
        Tone::Neutral,
        Tone::Supportive,
        Tone::Anxious,
        Tone::Angry,
        Tone::Frustrated,
        Tone::Sad,
        Tone::Withdrawn,
        Tone::Assertive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Supportive => "supportive",
            Tone::Anxious => "anxious",
            Tone::Angry => "angry",
            Tone::Frustrated => "frustrated",
            Tone::Sad => "sad",
            Tone::Withdrawn => "withdrawn",
            Tone::Assertive => "assertive",
        }
    }

    pub fn parse(s: &str) -> Option<Tone> {
        Tone::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability distribution over the tone vocabulary. Keys are stable
/// (BTreeMap) so serialized output is deterministic.
pub type ToneDistribution = BTreeMap<Tone, f32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_roundtrip() {
        for tone in Tone::ALL {
            assert_eq!(Tone::parse(tone.as_str()), Some(tone));
        }
        assert_eq!(Tone::parse("bogus"), None);
    }

    #[test]
    fn test_tone_serde_snake_case() {
        let json = serde_json::to_string(&Tone::Withdrawn).unwrap();
        assert_eq!(json, "\"withdrawn\"");
    }
}
