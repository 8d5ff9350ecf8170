use std::time::Duration;

/// Ingress configuration (spec §6 "Configuration: Enumerated..."), loaded
/// from the environment following the `IdempotencyConfig::from_env`
/// pattern: defaults first, each var parsed and applied only if present and
/// well-formed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Publish target for `reasoning_requested` events.
    pub topic_reasoning: String,
    /// Socket address the HTTP listener binds to. Ambient plumbing — spec
    /// §1 puts routing mechanics out of scope, but a bind address is
    /// unavoidable to actually run the service.
    pub bind_addr: String,
    /// How stale a `processing` receipt must be before another worker may
    /// reclaim it. Ingress doesn't claim receipts itself, but carries this
    /// so `serve` can hand one config to every stage.
    pub receipt_stale_threshold: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topic_reasoning: orch_bus::TOPIC_REASONING_REQUESTED.to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            receipt_stale_threshold: Duration::from_millis(120_000),
        }
    }
}

impl Config {
    /// Load configuration, applying `TOPIC_REASONING`, `BIND_ADDR`, and
    /// `RECEIPT_STALE_THRESHOLD_MS` overrides from the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(topic) = std::env::var("TOPIC_REASONING") {
            if !topic.trim().is_empty() {
                cfg.topic_reasoning = topic;
            }
        }

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            if !addr.trim().is_empty() {
                cfg.bind_addr = addr;
            }
        }

        if let Ok(ms) = std::env::var("RECEIPT_STALE_THRESHOLD_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                cfg.receipt_stale_threshold = Duration::from_millis(parsed);
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.topic_reasoning, "reasoning-requested");
        assert_eq!(cfg.receipt_stale_threshold, Duration::from_millis(120_000));
    }
}
