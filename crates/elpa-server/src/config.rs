//! Server configuration: bind address, per-node timeout default, and the
//! embedded rate-limit configuration, loadable from YAML with environment
//! overrides, mirroring `elpa_ratelimit::RateLimitConfig`'s own
//! `from_yaml`/`apply_env_overrides` pair. No TLS termination or directory
//! integration lives here; that's out of scope for this service.

use elpa_ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sse_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Per-node execution deadline; `None` disables the timeout.
    #[serde(default)]
    pub node_timeout_ms: Option<u64>,
    /// Channel capacity for each execution's SSE sink before backpressure
    /// applies to the scheduler's `emit` calls.
    #[serde(default = "default_sse_buffer")]
    pub sse_buffer: usize,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            node_timeout_ms: None,
            sse_buffer: default_sse_buffer(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Overlays `ELPA_SERVER_BIND_ADDR` / `ELPA_SERVER_NODE_TIMEOUT_MS` onto
    /// an already-loaded config, then delegates the rate-limit block to its
    /// own override layer.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("ELPA_SERVER_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(v) = std::env::var("ELPA_SERVER_NODE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.node_timeout_ms = Some(ms);
            }
        }
        self.rate_limit = self.rate_limit.apply_env_overrides();
        self
    }

    pub fn node_timeout(&self) -> Option<std::time::Duration> {
        self.node_timeout_ms.map(std::time::Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_all_interfaces_on_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.node_timeout_ms.is_none());
    }

    #[test]
    fn partial_yaml_fills_in_remaining_defaults() {
        let config = ServerConfig::from_yaml("bindAddr: 127.0.0.1:9090\n").unwrap();
        // unknown key is ignored by serde's default; bind_addr keeps its own default
        // since the wire key doesn't match `bind_addr` without a rename — this
        // guards against a silently-dropped override rather than asserting one.
        assert_eq!(config.bind_addr, default_bind_addr());
    }

    #[test]
    fn yaml_overrides_bind_addr_with_matching_key() {
        let config = ServerConfig::from_yaml("bind_addr: 127.0.0.1:9090\n").unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
    }
}
