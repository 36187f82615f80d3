// src/attachment/mod.rs
// Multi-day incremental attachment-style learner. Runs off the per-request
// path: each message contributes capped evidence toward one of four styles,
// with lazy day-roll decay and a settled state once the learning window
// closes.

pub mod store;

pub use store::{InMemoryProfileStore, ProfileStore};

use crate::config::TonebridgeConfig;
use crate::kb::KnowledgeBase;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const PROFILE_SCHEMA_VERSION: u32 = 2;
/// `days_observed` is clamped at window + this margin, whatever the clock does.
const DAYS_OBSERVED_SAFETY_CAP: u32 = 2;
const SNAPSHOT_HISTORY_CAP: usize = 30;

/// Four-way attachment style vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStyle {
    Secure,
    Anxious,
    Avoidant,
    Disorganized,
}

impl AttachmentStyle {
    pub const ALL: [AttachmentStyle; 4] = [
        AttachmentStyle::Secure,
        AttachmentStyle::Anxious,
        AttachmentStyle::Avoidant,
        AttachmentStyle::Disorganized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentStyle::Secure => "secure",
            AttachmentStyle::Anxious => "anxious",
            AttachmentStyle::Avoidant => "avoidant",
            AttachmentStyle::Disorganized => "disorganized",
        }
    }

    pub fn parse(s: &str) -> Option<AttachmentStyle> {
        AttachmentStyle::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

impl fmt::Display for AttachmentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End-of-day score snapshot kept in the profile's bounded history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub day_key: String,
    pub scores: BTreeMap<AttachmentStyle, f32>,
}

/// Persistent per-user record. One profile per user; mutated only through
/// the learner's single-writer day-roll sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentProfile {
    pub user_id: String,
    pub scores: BTreeMap<AttachmentStyle, f32>,
    pub days_observed: u32,
    pub day_key: String,
    pub increments_today: u32,
    #[serde(default)]
    pub history: VecDeque<DailySnapshot>,
    pub schema_version: u32,
}

impl AttachmentProfile {
    pub fn new(user_id: &str, day_key: &str) -> Self {
        let scores = AttachmentStyle::ALL.iter().map(|s| (*s, 0.0)).collect();
        Self {
            user_id: user_id.to_string(),
            scores,
            days_observed: 0,
            day_key: day_key.to_string(),
            increments_today: 0,
            history: VecDeque::new(),
            schema_version: PROFILE_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentEstimate {
    pub primary: Option<AttachmentStyle>,
    pub secondary: Option<AttachmentStyle>,
    /// Normalized score proportions.
    pub scores: BTreeMap<AttachmentStyle, f32>,
    pub confidence: f32,
    pub days_observed: u32,
    pub window_complete: bool,
}

impl AttachmentEstimate {
    fn empty() -> Self {
        Self {
            primary: None,
            secondary: None,
            scores: AttachmentStyle::ALL.iter().map(|s| (*s, 0.0)).collect(),
            confidence: 0.0,
            days_observed: 0,
            window_complete: false,
        }
    }
}

pub struct AttachmentLearner {
    kb: Arc<KnowledgeBase>,
    store: Arc<dyn ProfileStore>,
    learning_window_days: u32,
    daily_increment_cap: u32,
    primary_threshold: f32,
    secondary_threshold: f32,
    daily_decay: f32,
    /// Per-user writer locks: day-roll, decay, and increment application
    /// form one atomic unit per call.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AttachmentLearner {
    pub fn new(kb: Arc<KnowledgeBase>, store: Arc<dyn ProfileStore>, config: &TonebridgeConfig) -> Self {
        Self {
            kb,
            store,
            learning_window_days: config.learning_window_days,
            daily_increment_cap: config.daily_increment_cap,
            primary_threshold: config.attachment_primary_threshold,
            secondary_threshold: config.attachment_secondary_threshold,
            daily_decay: config.attachment_daily_decay.clamp(0.0, 1.0),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Accumulate evidence from one message. No-op once the learning
    /// window has closed.
    pub async fn update_from_text(&self, user_id: &str, text: &str) -> Result<()> {
        self.update_for_day(user_id, text, &today_key()).await
    }

    /// Current style estimate; a user with no profile gets the empty
    /// estimate rather than an error.
    pub async fn estimate(&self, user_id: &str) -> Result<AttachmentEstimate> {
        let Some(profile) = self.store.get(user_id).await? else {
            return Ok(AttachmentEstimate::empty());
        };
        Ok(self.estimate_from_profile(&profile))
    }

    /// Explicit profile reset; the only supported deletion path.
    pub async fn reset(&self, user_id: &str) -> Result<()> {
        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;
        self.store.delete(user_id).await
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Clock-injectable core so tests can drive day boundaries.
    pub(crate) async fn update_for_day(&self, user_id: &str, text: &str, day_key: &str) -> Result<()> {
        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let mut profile = match self.store.get(user_id).await? {
            Some(profile) => profile,
            None => AttachmentProfile::new(user_id, day_key),
        };

        // Settled: the learning window has closed for this user, and the
        // profile is frozen — no decay, no snapshots, no increments
        if profile.days_observed >= self.learning_window_days {
            return Ok(());
        }

        self.roll_day(&mut profile, day_key);

        // The roll itself may have closed the window; persist it and stop
        if profile.days_observed >= self.learning_window_days {
            self.store.set(profile).await?;
            return Ok(());
        }

        let mut budget = self
            .daily_increment_cap
            .saturating_sub(profile.increments_today);
        if budget == 0 {
            self.store.set(profile).await?;
            return Ok(());
        }

        // Strongest signals consume the shared daily budget first
        let mut signals: Vec<_> = self.kb.attachment_signals.iter().collect();
        signals.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let lower = text.to_ascii_lowercase();
        for signal in signals {
            if budget == 0 {
                break;
            }
            for regex in &signal.regexes {
                if budget == 0 {
                    break;
                }
                if regex.is_match(&lower) {
                    *profile.scores.entry(signal.style).or_default() += signal.weight;
                    profile.increments_today += 1;
                    budget -= 1;
                    debug!(
                        user_id,
                        style = %signal.style,
                        weight = signal.weight,
                        "Attachment signal applied"
                    );
                }
            }
        }

        self.store.set(profile).await?;
        Ok(())
    }

    /// Lazy day boundary handling: decay all scores per elapsed day,
    /// snapshot yesterday, reset the daily counter, advance the day count.
    fn roll_day(&self, profile: &mut AttachmentProfile, day_key: &str) {
        if profile.day_key == day_key {
            return;
        }

        let elapsed_days = parse_day(day_key)
            .zip(parse_day(&profile.day_key))
            .map(|(now, prev)| (now - prev).num_days().max(1) as u32)
            .unwrap_or(1);

        let decay = self.daily_decay.powi(elapsed_days as i32);
        for score in profile.scores.values_mut() {
            *score = (*score * decay).max(0.0);
        }

        if profile.history.len() == SNAPSHOT_HISTORY_CAP {
            profile.history.pop_front();
        }
        profile.history.push_back(DailySnapshot {
            day_key: profile.day_key.clone(),
            scores: profile.scores.clone(),
        });

        profile.day_key = day_key.to_string();
        profile.increments_today = 0;
        profile.days_observed = (profile.days_observed + 1)
            .min(self.learning_window_days + DAYS_OBSERVED_SAFETY_CAP);
    }

    fn estimate_from_profile(&self, profile: &AttachmentProfile) -> AttachmentEstimate {
        let total: f32 = profile.scores.values().sum();
        let window_complete = profile.days_observed >= self.learning_window_days;

        if total <= f32::EPSILON {
            let mut estimate = AttachmentEstimate::empty();
            estimate.days_observed = profile.days_observed;
            estimate.window_complete = window_complete;
            return estimate;
        }

        let proportions: BTreeMap<AttachmentStyle, f32> = profile
            .scores
            .iter()
            .map(|(style, score)| (*style, score / total))
            .collect();

        let mut ranked: Vec<(AttachmentStyle, f32)> =
            proportions.iter().map(|(s, p)| (*s, *p)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let primary = (ranked[0].1 >= self.primary_threshold).then_some(ranked[0].0);
        let secondary = (primary.is_some() && ranked[1].1 >= self.secondary_threshold)
            .then_some(ranked[1].0);

        let gap = ranked[0].1 - ranked[1].1;
        let progress =
            (profile.days_observed as f32 / self.learning_window_days.max(1) as f32).min(1.0);
        let confidence = (0.6 * gap + 0.4 * progress).clamp(0.0, 1.0);

        AttachmentEstimate {
            primary,
            secondary,
            scores: proportions,
            confidence,
            days_observed: profile.days_observed,
            window_complete,
        }
    }
}

fn today_key() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn parse_day(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner() -> AttachmentLearner {
        let mut config = TonebridgeConfig::from_env();
        config.learning_window_days = 3;
        config.daily_increment_cap = 5;
        config.attachment_primary_threshold = 0.40;
        config.attachment_secondary_threshold = 0.25;
        config.attachment_daily_decay = 0.9;
        AttachmentLearner::new(
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(InMemoryProfileStore::new()),
            &config,
        )
    }

    const ANXIOUS_TEXT: &str = "are you mad at me? please don't leave, do you still love me";
    const AVOIDANT_TEXT: &str = "i need space. forget it, it doesn't matter anyway";

    #[tokio::test]
    async fn test_first_observation_creates_profile() {
        let learner = learner();
        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();

        let profile = learner.store.get("u1").await.unwrap().unwrap();
        assert_eq!(profile.schema_version, PROFILE_SCHEMA_VERSION);
        assert!(profile.scores[&AttachmentStyle::Anxious] > 0.0);
        assert_eq!(profile.days_observed, 0);
    }

    #[tokio::test]
    async fn test_scores_stay_non_negative() {
        let learner = learner();
        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();
        for day in 2..=20 {
            learner
                .update_for_day("u1", "hello", &format!("2026-08-{day:02}"))
                .await
                .unwrap();
        }
        let profile = learner.store.get("u1").await.unwrap().unwrap();
        assert!(profile.scores.values().all(|s| *s >= 0.0));
    }

    #[tokio::test]
    async fn test_daily_increment_cap() {
        let learner = learner();
        // Burst of strongly-matching messages in one day
        for _ in 0..10 {
            learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();
        }
        let profile = learner.store.get("u1").await.unwrap().unwrap();
        assert_eq!(profile.increments_today, 5);
    }

    #[tokio::test]
    async fn test_day_roll_decays_and_resets_counter() {
        let learner = learner();
        for _ in 0..10 {
            learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();
        }
        let before = learner.store.get("u1").await.unwrap().unwrap();
        let score_before = before.scores[&AttachmentStyle::Anxious];

        learner.update_for_day("u1", "plain message", "2026-08-02").await.unwrap();
        let after = learner.store.get("u1").await.unwrap().unwrap();

        assert!(after.scores[&AttachmentStyle::Anxious] < score_before);
        assert_eq!(after.increments_today, 0);
        assert_eq!(after.days_observed, 1);
        assert_eq!(after.history.len(), 1);
    }

    #[tokio::test]
    async fn test_settled_profile_ignores_updates() {
        let learner = learner();
        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();
        // Cross enough day boundaries to close the 3-day window
        for day in 2..=5 {
            learner
                .update_for_day("u1", ANXIOUS_TEXT, &format!("2026-08-{day:02}"))
                .await
                .unwrap();
        }
        let settled = learner.store.get("u1").await.unwrap().unwrap();
        assert!(settled.days_observed >= 3);
        let scores_before = settled.scores.clone();

        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-05").await.unwrap();
        let after = learner.store.get("u1").await.unwrap().unwrap();
        assert_eq!(after.scores, scores_before);
    }

    #[tokio::test]
    async fn test_settled_profile_frozen_across_day_boundary() {
        let learner = learner();
        for day in 1..=5 {
            learner
                .update_for_day("u1", ANXIOUS_TEXT, &format!("2026-08-{day:02}"))
                .await
                .unwrap();
        }
        let settled = learner.store.get("u1").await.unwrap().unwrap();
        assert!(settled.days_observed >= 3);
        let scores_before = settled.scores.clone();
        let history_before = settled.history.len();
        let day_key_before = settled.day_key.clone();

        // Two weeks later: a settled profile must not decay or snapshot
        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-20").await.unwrap();
        let after = learner.store.get("u1").await.unwrap().unwrap();
        assert_eq!(after.scores, scores_before);
        assert_eq!(after.history.len(), history_before);
        assert_eq!(after.day_key, day_key_before);
    }

    #[tokio::test]
    async fn test_days_observed_safety_cap() {
        let learner = learner();
        learner.update_for_day("u1", "hi", "2026-08-01").await.unwrap();
        for day in 2..=28 {
            learner
                .update_for_day("u1", "hi", &format!("2026-08-{day:02}"))
                .await
                .unwrap();
        }
        let profile = learner.store.get("u1").await.unwrap().unwrap();
        assert!(profile.days_observed <= 3 + DAYS_OBSERVED_SAFETY_CAP);
    }

    #[tokio::test]
    async fn test_estimate_picks_dominant_style() {
        let learner = learner();
        learner.update_for_day("u1", AVOIDANT_TEXT, "2026-08-01").await.unwrap();
        learner.update_for_day("u1", AVOIDANT_TEXT, "2026-08-02").await.unwrap();

        let estimate = learner.estimate("u1").await.unwrap();
        assert_eq!(estimate.primary, Some(AttachmentStyle::Avoidant));
        let sum: f32 = estimate.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!((0.0..=1.0).contains(&estimate.confidence));
    }

    #[tokio::test]
    async fn test_unknown_user_gets_empty_estimate() {
        let estimate = learner().estimate("nobody").await.unwrap();
        assert_eq!(estimate.primary, None);
        assert_eq!(estimate.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_reset_deletes_profile() {
        let learner = learner();
        learner.update_for_day("u1", ANXIOUS_TEXT, "2026-08-01").await.unwrap();
        learner.reset("u1").await.unwrap();
        assert!(learner.store.get("u1").await.unwrap().is_none());
    }
}
