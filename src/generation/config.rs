use crate::retry::RetryPolicy;
use std::env;
use std::time::Duration;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Configuration for the question generation API client.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL of the generation API; generation is disabled when unset.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
    pub max_questions: usize,
    pub retry: RetryPolicy,
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_optional("GENERATION_API_URL"),
            api_key: env_optional("GENERATION_API_KEY"),
            model: env_optional("GENERATION_MODEL").unwrap_or_else(|| "default".to_string()),
            request_timeout: env_duration_millis("GENERATION_TIMEOUT_MS", 60_000),
            max_questions: env_usize("GENERATION_MAX_QUESTIONS", 20),
            retry: RetryPolicy::new(
                env_usize("GENERATION_MAX_ATTEMPTS", 3),
                env_duration_millis("GENERATION_RETRY_BASE_MS", 1_000),
            ),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
