// src/tone/buckets.rs
// Maps a (tone, context, intensity) triple onto the three suggestion
// severity buckets. Pure and deterministic: same inputs and tables, same
// distribution.

use crate::kb::BucketTables;
use crate::tone::Tone;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Suggestion severity buckets, mildest to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Clear,
    Caution,
    Alert,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Clear, Bucket::Caution, Bucket::Alert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Clear => "clear",
            Bucket::Caution => "caution",
            Bucket::Alert => "alert",
        }
    }
}

/// A weight (or probability mass) per bucket. Derived per request, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketWeights {
    pub clear: f32,
    pub caution: f32,
    pub alert: f32,
}

impl BucketWeights {
    pub fn new(clear: f32, caution: f32, alert: f32) -> Self {
        Self { clear, caution, alert }
    }

    pub fn get(&self, bucket: Bucket) -> f32 {
        match bucket {
            Bucket::Clear => self.clear,
            Bucket::Caution => self.caution,
            Bucket::Alert => self.alert,
        }
    }

    /// Bucket with the largest mass; ties resolve toward the milder bucket.
    pub fn dominant(&self) -> Bucket {
        let mut best = Bucket::Clear;
        let mut best_mass = self.clear;
        for bucket in [Bucket::Caution, Bucket::Alert] {
            if self.get(bucket) > best_mass {
                best = bucket;
                best_mass = self.get(bucket);
            }
        }
        best
    }

    /// Clamp each bucket at zero and renormalize to sum to 1. A degenerate
    /// all-zero input falls back to the uniform distribution.
    pub fn normalized(&self) -> Self {
        let clear = self.clear.max(0.0);
        let caution = self.caution.max(0.0);
        let alert = self.alert.max(0.0);
        let sum = clear + caution + alert;
        if sum <= f32::EPSILON {
            return Self::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        Self::new(clear / sum, caution / sum, alert / sum)
    }
}

/// Stateless mapper over the startup-loaded bucket tables.
#[derive(Clone)]
pub struct ToneBucketMapper {
    tables: Arc<BucketTables>,
}

impl ToneBucketMapper {
    pub fn new(tables: Arc<BucketTables>) -> Self {
        Self { tables }
    }

    /// Look up the base distribution for the tone, replace it with a
    /// (context, tone) override when one exists, apply the intensity shift
    /// band, then clamp and renormalize.
    pub fn map(&self, tone: Tone, context: Option<&str>, intensity: f32) -> BucketWeights {
        let mut dist = self
            .tables
            .override_for(context, tone)
            .unwrap_or_else(|| self.tables.base_for(tone));

        let shift = self.tables.intensity_shift(intensity);
        dist.clear += shift.clear;
        dist.caution += shift.caution;
        dist.alert += shift.alert;

        dist.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::KnowledgeBase;

    fn mapper() -> ToneBucketMapper {
        let kb = KnowledgeBase::builtin();
        ToneBucketMapper::new(kb.bucket_tables.clone())
    }

    fn assert_sums_to_one(w: BucketWeights) {
        let sum = w.clear + w.caution + w.alert;
        assert!((sum - 1.0).abs() < 1e-5, "sum was {sum}");
        assert!(w.clear >= 0.0 && w.caution >= 0.0 && w.alert >= 0.0);
    }

    #[test]
    fn test_distribution_sums_to_one_for_all_tones() {
        let mapper = mapper();
        for tone in Tone::ALL {
            for intensity in [0.0, 0.5, 1.0] {
                assert_sums_to_one(mapper.map(tone, None, intensity));
            }
        }
    }

    #[test]
    fn test_map_is_idempotent() {
        let mapper = mapper();
        let a = mapper.map(Tone::Angry, Some("conflict"), 0.7);
        let b = mapper.map(Tone::Angry, Some("conflict"), 0.7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_high_intensity_shifts_toward_alert() {
        let mapper = mapper();
        let low = mapper.map(Tone::Angry, None, 0.1);
        let high = mapper.map(Tone::Angry, None, 0.95);
        assert!(high.alert > low.alert);
    }

    #[test]
    fn test_unknown_context_falls_back_to_base() {
        let mapper = mapper();
        let base = mapper.map(Tone::Sad, None, 0.5);
        let unknown = mapper.map(Tone::Sad, Some("no-such-context"), 0.5);
        assert_eq!(base, unknown);
    }

    #[test]
    fn test_normalized_handles_all_zero() {
        let uniform = BucketWeights::new(0.0, 0.0, 0.0).normalized();
        assert_sums_to_one(uniform);
    }

    #[test]
    fn test_dominant_prefers_milder_on_tie() {
        let w = BucketWeights::new(0.4, 0.4, 0.2);
        assert_eq!(w.dominant(), Bucket::Clear);
    }
}
