// src/config/mod.rs
// All tunables load from the environment (.env supported) with sane defaults.
// Read once at startup; never reloaded mid-request.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct TonebridgeConfig {
    // ── Server
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub request_timeout_secs: u64,

    // ── External parser collaborator
    pub parser_enabled: bool,
    pub parser_base_url: String,
    pub parser_internal_key: String,
    /// Only the trailing window of the text is sent and hashed; recent
    /// characters matter most for tone.
    pub parser_truncation_chars: usize,
    pub parser_cache_size: usize,
    pub parser_typing_timeout_ms: u64,
    pub parser_finalize_timeout_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,

    // ── Classification
    pub max_text_chars: usize,
    pub softmax_temperature: f32,
    pub confidence_floor: f32,
    pub confidence_ceiling: f32,

    // ── Session smoothing
    pub smoothing_alpha: f32,
    pub smoothing_hysteresis: f32,
    /// Exponential decay rate per elapsed second applied to the previous
    /// confidence before blending.
    pub smoothing_decay_per_sec: f32,
    pub session_idle_reset_secs: u64,

    // ── Attachment learning
    pub learning_window_days: u32,
    pub daily_increment_cap: u32,
    pub attachment_primary_threshold: f32,
    pub attachment_secondary_threshold: f32,
    pub attachment_daily_decay: f32,

    // ── Advice ranking
    pub max_suggestions: usize,

    // ── Knowledge base
    pub kb_dir: String,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Tolerate trailing comments and whitespace in .env values
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {key} = '{val}' (parse failed, using default)");
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl TonebridgeConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            host: env_var_or("TB_HOST", "0.0.0.0".to_string()),
            port: env_var_or("TB_PORT", 3002),
            cors_origin: env_var_or("TB_CORS_ORIGIN", "*".to_string()),
            request_timeout_secs: env_var_or("TB_REQUEST_TIMEOUT_SECS", 10),

            parser_enabled: env_var_or("TB_PARSER_ENABLED", true),
            parser_base_url: env_var_or("TB_PARSER_URL", "http://localhost:8000".to_string()),
            parser_internal_key: env_var_or("TB_PARSER_INTERNAL_KEY", String::new()),
            parser_truncation_chars: env_var_or("TB_PARSER_TRUNCATION_CHARS", 600),
            parser_cache_size: env_var_or("TB_PARSER_CACHE_SIZE", 256),
            parser_typing_timeout_ms: env_var_or("TB_PARSER_TYPING_TIMEOUT_MS", 350),
            parser_finalize_timeout_ms: env_var_or("TB_PARSER_FINALIZE_TIMEOUT_MS", 1500),
            breaker_failure_threshold: env_var_or("TB_BREAKER_FAILURE_THRESHOLD", 4),
            breaker_cooldown_secs: env_var_or("TB_BREAKER_COOLDOWN_SECS", 30),

            max_text_chars: env_var_or("TB_MAX_TEXT_CHARS", 2000),
            softmax_temperature: env_var_or("TB_SOFTMAX_TEMPERATURE", 1.4),
            confidence_floor: env_var_or("TB_CONFIDENCE_FLOOR", 0.15),
            confidence_ceiling: env_var_or("TB_CONFIDENCE_CEILING", 0.95),

            smoothing_alpha: env_var_or("TB_SMOOTHING_ALPHA", 0.6),
            smoothing_hysteresis: env_var_or("TB_SMOOTHING_HYSTERESIS", 0.18),
            smoothing_decay_per_sec: env_var_or("TB_SMOOTHING_DECAY_PER_SEC", 0.012),
            session_idle_reset_secs: env_var_or("TB_SESSION_IDLE_RESET_SECS", 300),

            learning_window_days: env_var_or("TB_LEARNING_WINDOW_DAYS", 7),
            daily_increment_cap: env_var_or("TB_DAILY_INCREMENT_CAP", 30),
            attachment_primary_threshold: env_var_or("TB_ATTACHMENT_PRIMARY_THRESHOLD", 0.40),
            attachment_secondary_threshold: env_var_or("TB_ATTACHMENT_SECONDARY_THRESHOLD", 0.25),
            attachment_daily_decay: env_var_or("TB_ATTACHMENT_DAILY_DECAY", 0.92),

            max_suggestions: env_var_or("TB_MAX_SUGGESTIONS", 3),

            kb_dir: env_var_or("TB_KB_DIR", "./kb".to_string()),

            log_level: env_var_or("TB_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-phase parser timeout. Typing calls are interactive and must
    /// return fast; finalize calls may wait for the full analysis.
    pub fn parser_timeout_ms(&self, finalize: bool) -> u64 {
        if finalize {
            self.parser_finalize_timeout_ms
        } else {
            self.parser_typing_timeout_ms
        }
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<TonebridgeConfig> = Lazy::new(TonebridgeConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TonebridgeConfig::from_env();

        assert_eq!(config.max_text_chars, 2000);
        assert!(config.softmax_temperature > 1.0);
        assert!(config.confidence_floor < config.confidence_ceiling);
        assert!(config.attachment_secondary_threshold < config.attachment_primary_threshold);
    }

    #[test]
    fn test_phase_timeouts() {
        let config = TonebridgeConfig::from_env();

        // Interactive typing calls must be bounded tighter than finalize
        assert!(config.parser_timeout_ms(false) <= config.parser_timeout_ms(true));
    }

    #[test]
    fn test_bind_address() {
        let config = TonebridgeConfig::from_env();
        assert!(config.bind_address().contains(':'));
    }

    #[test]
    fn test_env_var_or_rejects_garbage() {
        std::env::set_var("TB_TEST_GARBAGE", "not-a-number");
        let parsed: u64 = env_var_or("TB_TEST_GARBAGE", 7);
        assert_eq!(parsed, 7);
        std::env::remove_var("TB_TEST_GARBAGE");
    }
}
