//! Limiter configuration: caps and window sizes for each of the four
//! rate-limit windows, loadable from YAML with environment overrides.

use serde::{Deserialize, Serialize};

fn default_daily_cap() -> u64 {
    500
}
fn default_hourly_cap() -> u64 {
    100
}
fn default_burst_cap() -> u64 {
    10
}
fn default_burst_window_secs() -> i64 {
    60
}
fn default_ip_cap() -> u64 {
    30
}
fn default_ip_window_secs() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u64,
    #[serde(default = "default_hourly_cap")]
    pub hourly_cap: u64,
    #[serde(default = "default_burst_cap")]
    pub burst_cap: u64,
    #[serde(default = "default_burst_window_secs")]
    pub burst_window_secs: i64,
    #[serde(default = "default_ip_cap")]
    pub ip_cap: u64,
    #[serde(default = "default_ip_window_secs")]
    pub ip_window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            hourly_cap: default_hourly_cap(),
            burst_cap: default_burst_cap(),
            burst_window_secs: default_burst_window_secs(),
            ip_cap: default_ip_cap(),
            ip_window_secs: default_ip_window_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Parse from a YAML document, falling back to defaults for any field
    /// the document omits.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Overlay caps set via environment variables
    /// (`ELPA_RATE_LIMIT_DAILY_CAP`, `..._HOURLY_CAP`, `..._BURST_CAP`,
    /// `..._IP_CAP`) onto an already-loaded config, mirroring the
    /// env-override layer of the server's own config loader.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_u64("ELPA_RATE_LIMIT_DAILY_CAP") {
            self.daily_cap = v;
        }
        if let Some(v) = env_u64("ELPA_RATE_LIMIT_HOURLY_CAP") {
            self.hourly_cap = v;
        }
        if let Some(v) = env_u64("ELPA_RATE_LIMIT_BURST_CAP") {
            self.burst_cap = v;
        }
        if let Some(v) = env_u64("ELPA_RATE_LIMIT_IP_CAP") {
            self.ip_cap = v;
        }
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = RateLimitConfig::default();
        assert_eq!(config.daily_cap, 500);
        assert_eq!(config.hourly_cap, 100);
        assert_eq!(config.burst_cap, 10);
        assert_eq!(config.burst_window_secs, 60);
        assert_eq!(config.ip_cap, 30);
        assert_eq!(config.ip_window_secs, 60);
    }

    #[test]
    fn partial_yaml_fills_in_remaining_defaults() {
        let config = RateLimitConfig::from_yaml("daily_cap: 50\n").unwrap();
        assert_eq!(config.daily_cap, 50);
        assert_eq!(config.burst_cap, 10);
    }
}
