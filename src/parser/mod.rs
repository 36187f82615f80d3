// src/parser/mod.rs
// ExternalParserGateway: fronts the linguistic parser with an LRU cache, a
// circuit breaker, per-phase timeouts, and a local fallback analyzer. The
// contract is that process() ALWAYS returns a result.

pub mod breaker;
pub mod cache;
pub mod client;
pub mod fallback;
pub mod types;

use crate::config::TonebridgeConfig;
use breaker::CircuitBreaker;
use cache::ParseCache;
use client::{HttpParserClient, ParserClient};
use fallback::FallbackAnalyzer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use types::{CompactParseResult, ParsePhase};

pub struct ParserGateway {
    client: Arc<dyn ParserClient>,
    fallback: FallbackAnalyzer,
    cache: ParseCache,
    breaker: CircuitBreaker,
    enabled: bool,
    truncation_chars: usize,
    typing_timeout: Duration,
    finalize_timeout: Duration,
}

impl ParserGateway {
    pub fn from_config(config: &TonebridgeConfig) -> Self {
        let client = Arc::new(HttpParserClient::new(
            config.parser_base_url.clone(),
            config.parser_internal_key.clone(),
        ));
        Self::new(client, config)
    }

    pub fn new(client: Arc<dyn ParserClient>, config: &TonebridgeConfig) -> Self {
        Self {
            client,
            fallback: FallbackAnalyzer::new(),
            cache: ParseCache::new(config.parser_cache_size),
            breaker: CircuitBreaker::new(
                config.breaker_failure_threshold,
                Duration::from_secs(config.breaker_cooldown_secs),
            ),
            enabled: config.parser_enabled,
            truncation_chars: config.parser_truncation_chars,
            typing_timeout: Duration::from_millis(config.parser_typing_timeout_ms),
            finalize_timeout: Duration::from_millis(config.parser_finalize_timeout_ms),
        }
    }

    /// Analyze `text`, preferring the external parser but never failing:
    /// cache hit → external call (bounded by the phase timeout) → local
    /// fallback. Timeouts and errors feed the circuit breaker.
    pub async fn process(&self, text: &str, phase: ParsePhase) -> CompactParseResult {
        // Recent characters matter most for tone; hash only the tail.
        let window = tail_chars(text, self.truncation_chars);
        let key = ParseCache::key(phase, window);

        if let Some(hit) = self.cache.get(&key).await {
            debug!(phase = phase.as_str(), "Parse cache hit");
            return hit;
        }

        if !self.enabled || !self.breaker.allow() {
            return self.fallback.analyze(window);
        }

        let timeout = match phase {
            ParsePhase::Typing => self.typing_timeout,
            ParsePhase::Finalize => self.finalize_timeout,
        };

        match tokio::time::timeout(timeout, self.client.process(window, phase)).await {
            Ok(Ok(result)) => {
                self.breaker.record_success();
                self.cache.put(key, result.clone()).await;
                result
            }
            Ok(Err(e)) => {
                warn!(phase = phase.as_str(), error = %e, "Parser call failed, using fallback");
                self.breaker.record_failure();
                self.fallback.analyze(window)
            }
            Err(_) => {
                warn!(
                    phase = phase.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Parser call timed out, using fallback"
                );
                self.breaker.record_failure();
                self.fallback.analyze(window)
            }
        }
    }

    /// Breaker visibility for the health endpoint.
    pub fn circuit_open(&self) -> bool {
        self.breaker.is_open()
    }
}

/// Last `max_chars` characters of `text`, on a char boundary.
fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted double: fails the first `fail_first` calls, then succeeds.
    struct ScriptedClient {
        calls: AtomicU32,
        fail_first: u32,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn failing(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: 0,
                delay: Some(delay),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ParserClient for ScriptedClient {
        async fn process(&self, _text: &str, _phase: ParsePhase) -> anyhow::Result<CompactParseResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if n < self.fail_first {
                return Err(anyhow!("simulated network failure"));
            }
            Ok(serde_json::from_value(serde_json::json!({
                "tokens": [{"text": "ok", "lemma": "ok", "pos": "INTJ", "i": 0}]
            }))
            .unwrap())
        }
    }

    fn test_config() -> TonebridgeConfig {
        let mut config = TonebridgeConfig::from_env();
        config.parser_enabled = true;
        config.breaker_failure_threshold = 3;
        config.breaker_cooldown_secs = 60;
        config.parser_typing_timeout_ms = 50;
        config.parser_finalize_timeout_ms = 50;
        config.parser_truncation_chars = 20;
        config
    }

    #[tokio::test]
    async fn test_result_is_always_returned_on_failure() {
        let client = Arc::new(ScriptedClient::failing(100));
        let gateway = ParserGateway::new(client, &test_config());

        let result = gateway.process("hello there", ParsePhase::Finalize).await;
        assert_eq!(result.source, types::ParseSource::Fallback);
    }

    #[tokio::test]
    async fn test_breaker_trips_and_suppresses_calls() {
        let client = Arc::new(ScriptedClient::failing(100));
        let gateway = ParserGateway::new(client.clone(), &test_config());

        // Distinct texts so the cache never short-circuits
        for i in 0..3 {
            gateway.process(&format!("msg {i}"), ParsePhase::Finalize).await;
        }
        assert!(gateway.circuit_open());
        assert_eq!(client.call_count(), 3);

        // Open circuit: no further external calls
        gateway.process("msg after trip", ParsePhase::Finalize).await;
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cooldown_then_success_resets() {
        let client = Arc::new(ScriptedClient::failing(3));
        let mut config = test_config();
        config.breaker_cooldown_secs = 0;
        let gateway = ParserGateway::new(client.clone(), &config);

        for i in 0..3 {
            gateway.process(&format!("msg {i}"), ParsePhase::Finalize).await;
        }
        // Zero cooldown: next call goes through and succeeds
        let result = gateway.process("recovered", ParsePhase::Finalize).await;
        assert_eq!(result.source, types::ParseSource::External);
        assert!(!gateway.circuit_open());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let client = Arc::new(ScriptedClient::slow(Duration::from_millis(500)));
        let mut config = test_config();
        config.breaker_failure_threshold = 1;
        let gateway = ParserGateway::new(client, &config);

        let result = gateway.process("slow one", ParsePhase::Typing).await;
        assert_eq!(result.source, types::ParseSource::Fallback);
        assert!(gateway.circuit_open());
    }

    #[tokio::test]
    async fn test_cache_hit_bypasses_external_call() {
        let client = Arc::new(ScriptedClient::failing(0));
        let gateway = ParserGateway::new(client.clone(), &test_config());

        gateway.process("same message", ParsePhase::Finalize).await;
        gateway.process("same message", ParsePhase::Finalize).await;
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_parser_uses_fallback_without_calls() {
        let client = Arc::new(ScriptedClient::failing(0));
        let mut config = test_config();
        config.parser_enabled = false;
        let gateway = ParserGateway::new(client.clone(), &config);

        let result = gateway.process("hello", ParsePhase::Typing).await;
        assert_eq!(result.source, types::ParseSource::Fallback);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("héllo", 10), "héllo");
        // Multi-byte chars at the cut point must not split
        assert_eq!(tail_chars("ααββ", 2), "ββ");
    }
}
