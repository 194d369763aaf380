//! Runtime configuration
//!
//! All tunables live here so tests and binaries can substitute their own
//! values instead of relying on process-wide constants.

use std::env;

/// Configuration for one agent process
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum model⟷tool hops per turn before the fallback reply
    pub max_hops: usize,
    /// Number of memory items loaded as conversational context
    pub memory_items: usize,
    /// TTL for persisted memory items, in seconds
    pub memory_ttl_seconds: i64,
    /// Character budget for the rendered context block
    pub context_max_chars: usize,
    /// Similarity score at which a catalog match is accepted automatically
    pub fuzzy_accept_threshold: f64,
    /// Number of ranked alternatives surfaced when no match is accepted
    pub fuzzy_top_k: usize,
    /// Chat-completions model name
    pub model_name: String,
    /// Base URL of the chat-completions endpoint
    pub model_base_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_hops: 6,
            memory_items: 6,
            memory_ttl_seconds: 36_000,
            context_max_chars: 1500,
            fuzzy_accept_threshold: 0.8,
            fuzzy_top_k: 5,
            model_name: "gpt-5-nano".to_string(),
            model_base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl AgentConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_hops: env_parse("AGENT_MAX_HOPS", defaults.max_hops),
            memory_items: env_parse("AGENT_MEMORY_ITEMS", defaults.memory_items),
            memory_ttl_seconds: env_parse("AGENT_MEMORY_TTL_SECONDS", defaults.memory_ttl_seconds),
            context_max_chars: env_parse("AGENT_CONTEXT_MAX_CHARS", defaults.context_max_chars),
            fuzzy_accept_threshold: env_parse(
                "AGENT_FUZZY_ACCEPT_THRESHOLD",
                defaults.fuzzy_accept_threshold,
            ),
            fuzzy_top_k: env_parse("AGENT_FUZZY_TOP_K", defaults.fuzzy_top_k),
            model_name: env::var("OPENAI_MODEL").unwrap_or(defaults.model_name),
            model_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.model_base_url),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_hops, 6);
        assert_eq!(config.memory_items, 6);
        assert_eq!(config.context_max_chars, 1500);
        assert!(config.fuzzy_accept_threshold > 0.0 && config.fuzzy_accept_threshold < 1.0);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        env::set_var("AGENT_TEST_GARBAGE", "not-a-number");
        let value: usize = env_parse("AGENT_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        env::remove_var("AGENT_TEST_GARBAGE");
    }
}
