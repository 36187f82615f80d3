// src/tone/smoother.rs
// Session-scoped tone smoothing: exponential time decay of the previous
// confidence, hysteresis against tone flapping, and an EWMA confidence
// blend. Keeps a bounded rolling history per session.

use crate::config::TonebridgeConfig;
use crate::tone::Tone;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const HISTORY_CAP: usize = 10;

#[derive(Debug, Clone)]
struct HistoryEntry {
    tone: Tone,
    confidence: f32,
    timestamp_ms: i64,
}

#[derive(Debug)]
struct SessionState {
    last_tone: Tone,
    last_confidence: f32,
    last_timestamp_ms: i64,
    history: VecDeque<HistoryEntry>,
}

impl SessionState {
    fn seed(tone: Tone, confidence: f32, timestamp_ms: i64) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_CAP);
        history.push_back(HistoryEntry {
            tone,
            confidence,
            timestamp_ms,
        });
        Self {
            last_tone: tone,
            last_confidence: confidence,
            last_timestamp_ms: timestamp_ms,
            history,
        }
    }

    fn push(&mut self, tone: Tone, confidence: f32, timestamp_ms: i64) {
        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            tone,
            confidence,
            timestamp_ms,
        });
        self.last_tone = tone;
        self.last_confidence = confidence;
        self.last_timestamp_ms = timestamp_ms;
    }

    /// Fraction of recent entries sharing the current tone.
    fn stability(&self) -> f32 {
        if self.history.is_empty() {
            return 1.0;
        }
        let same = self
            .history
            .iter()
            .filter(|e| e.tone == self.last_tone)
            .count();
        same as f32 / self.history.len() as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedTone {
    pub tone: Tone,
    pub confidence: f32,
    /// Fraction of recent history sharing this tone.
    pub stability: f32,
    /// Recent confidence delta (positive = rising).
    pub trend: f32,
    /// True when hysteresis kept the previous tone.
    pub change_suppressed: bool,
}

/// Per-session smoothing state. All read-modify-write of one session
/// happens under the map lock, so concurrent messages cannot interleave a
/// partial update into the rolling history.
pub struct ToneSmoother {
    alpha: f32,
    hysteresis: f32,
    decay_per_sec: f32,
    idle_reset: Duration,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl ToneSmoother {
    pub fn from_config(config: &TonebridgeConfig) -> Self {
        Self {
            alpha: config.smoothing_alpha.clamp(0.0, 1.0),
            hysteresis: config.smoothing_hysteresis,
            decay_per_sec: config.smoothing_decay_per_sec,
            idle_reset: Duration::from_secs(config.session_idle_reset_secs),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Smooth one classification into the session trend. The first message
    /// of a session (or the first after the idle window) seeds the state
    /// and passes through unchanged.
    pub async fn smooth(
        &self,
        session_id: &str,
        tone: Tone,
        confidence: f32,
        timestamp_ms: i64,
    ) -> SmoothedTone {
        let mut sessions = self.sessions.lock().await;

        let state = match sessions.get_mut(session_id) {
            Some(state) => state,
            None => {
                sessions.insert(
                    session_id.to_string(),
                    SessionState::seed(tone, confidence, timestamp_ms),
                );
                return SmoothedTone {
                    tone,
                    confidence,
                    stability: 1.0,
                    trend: 0.0,
                    change_suppressed: false,
                };
            }
        };

        // Out-of-order completion must not produce negative elapsed time
        let elapsed_secs =
            ((timestamp_ms - state.last_timestamp_ms).max(0) as f32 / 1000.0).min(86_400.0);

        if elapsed_secs > self.idle_reset.as_secs_f32() {
            debug!(session_id, "Session idle window elapsed, reseeding smoother state");
            *state = SessionState::seed(tone, confidence, timestamp_ms);
            return SmoothedTone {
                tone,
                confidence,
                stability: 1.0,
                trend: 0.0,
                change_suppressed: false,
            };
        }

        let decayed_prev = state.last_confidence * (-self.decay_per_sec * elapsed_secs).exp();

        let (final_tone, change_suppressed) = if tone != state.last_tone {
            let delta = confidence - decayed_prev;
            if delta < self.hysteresis {
                (state.last_tone, true)
            } else {
                (tone, false)
            }
        } else {
            (tone, false)
        };

        let final_confidence =
            (self.alpha * confidence + (1.0 - self.alpha) * decayed_prev).clamp(0.0, 1.0);
        let trend = final_confidence - decayed_prev;

        state.push(final_tone, final_confidence, timestamp_ms);

        SmoothedTone {
            tone: final_tone,
            confidence: final_confidence,
            stability: state.stability(),
            trend,
            change_suppressed,
        }
    }

    /// Drop a session's smoothing state entirely.
    pub async fn reset(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}
