//! The rate-limit gate: `elpa-server` asks it before admitting an
//! execution request. All applicable windows must admit or the request is
//! denied and the first failing window is named.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::store::RateLimitStore;

#[derive(Debug, Clone, Serialize)]
pub struct WindowLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionLimits {
    pub teacher: WindowLimitStatus,
    pub classroom: Option<WindowLimitStatus>,
    pub burst: WindowLimitStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limits: ExecutionLimits,
    pub limit_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpLimitDecision {
    pub allowed: bool,
    pub limit: WindowLimitStatus,
    pub limit_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub daily: WindowLimitStatus,
    pub burst: WindowLimitStatus,
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc()
}

fn hour_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(now.hour(), 0, 0)
        .expect("top of the hour is valid")
        .and_utc()
}

/// Admission gate over four independent windows. Holds an
/// injected store and clock so both the backend and time are test seams.
pub struct RateLimitGate {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimitGate {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self { store, clock, config }
    }

    fn fail_open_decision(&self, now: DateTime<Utc>) -> RateLimitDecision {
        tracing::warn!("rate-limit store unreachable; failing open");
        let full = |cap: u64, reset_at: DateTime<Utc>| WindowLimitStatus {
            limit: cap,
            remaining: cap,
            reset_at,
        };
        RateLimitDecision {
            allowed: true,
            limits: ExecutionLimits {
                teacher: full(self.config.daily_cap, day_start(now) + Duration::days(1)),
                classroom: None,
                burst: full(self.config.burst_cap, now + Duration::seconds(self.config.burst_window_secs)),
            },
            limit_type: None,
        }
    }

    pub async fn check_execution_limit(
        &self,
        teacher_id: &str,
        classroom_id: Option<&str>,
    ) -> RateLimitDecision {
        let now = self.clock.now();
        let day_start = day_start(now);
        let daily_key = format!("daily:{teacher_id}");

        let daily_count = match self.store.fixed_window_count(&daily_key, day_start).await {
            Ok(c) => c,
            Err(_) => return self.fail_open_decision(now),
        };
        let mut limit_type = None;
        if daily_count >= self.config.daily_cap {
            limit_type = Some("daily".to_string());
        }
        let teacher_status = WindowLimitStatus {
            limit: self.config.daily_cap,
            remaining: self.config.daily_cap.saturating_sub(daily_count),
            reset_at: day_start + Duration::days(1),
        };

        let hour_start_val = hour_start(now);
        let hourly_key = classroom_id.map(|cid| format!("hourly:{cid}"));
        let classroom_status = if let Some(key) = &hourly_key {
            let count = match self.store.fixed_window_count(key, hour_start_val).await {
                Ok(c) => c,
                Err(_) => return self.fail_open_decision(now),
            };
            if limit_type.is_none() && count >= self.config.hourly_cap {
                limit_type = Some("hourly".to_string());
            }
            Some(WindowLimitStatus {
                limit: self.config.hourly_cap,
                remaining: self.config.hourly_cap.saturating_sub(count),
                reset_at: hour_start_val + Duration::hours(1),
            })
        } else {
            None
        };

        let burst_key = format!("burst:{teacher_id}");
        let burst_window = Duration::seconds(self.config.burst_window_secs);
        let burst_count = match self.store.sliding_window_count(&burst_key, now, burst_window).await {
            Ok(c) => c,
            Err(_) => return self.fail_open_decision(now),
        };
        if limit_type.is_none() && burst_count >= self.config.burst_cap {
            limit_type = Some("burst".to_string());
        }
        let burst_status = WindowLimitStatus {
            limit: self.config.burst_cap,
            remaining: self.config.burst_cap.saturating_sub(burst_count),
            reset_at: now + burst_window,
        };

        let allowed = limit_type.is_none();
        if allowed {
            let _ = self.store.fixed_window_increment(&daily_key, day_start).await;
            if let Some(key) = &hourly_key {
                let _ = self.store.fixed_window_increment(key, hour_start_val).await;
            }
            let _ = self.store.sliding_window_increment(&burst_key, now, burst_window).await;
        }

        RateLimitDecision {
            allowed,
            limits: ExecutionLimits {
                teacher: teacher_status,
                classroom: classroom_status,
                burst: burst_status,
            },
            limit_type,
        }
    }

    pub async fn check_ip_limit(&self, ip: &str) -> IpLimitDecision {
        let now = self.clock.now();
        let key = format!("ip:{ip}");
        let window = Duration::seconds(self.config.ip_window_secs);

        let count = match self.store.sliding_window_count(&key, now, window).await {
            Ok(c) => c,
            Err(_) => {
                tracing::warn!("rate-limit store unreachable; failing open for ip check");
                return IpLimitDecision {
                    allowed: true,
                    limit: WindowLimitStatus {
                        limit: self.config.ip_cap,
                        remaining: self.config.ip_cap,
                        reset_at: now + window,
                    },
                    limit_type: None,
                };
            }
        };

        let allowed = count < self.config.ip_cap;
        if allowed {
            let _ = self.store.sliding_window_increment(&key, now, window).await;
        }

        IpLimitDecision {
            allowed,
            limit: WindowLimitStatus {
                limit: self.config.ip_cap,
                remaining: self.config.ip_cap.saturating_sub(count),
                reset_at: now + window,
            },
            limit_type: if allowed { None } else { Some("ip".to_string()) },
        }
    }

    pub async fn get_usage_stats(&self, teacher_id: &str) -> UsageStats {
        let now = self.clock.now();
        let day_start_val = day_start(now);
        let daily_count = self
            .store
            .fixed_window_count(&format!("daily:{teacher_id}"), day_start_val)
            .await
            .unwrap_or(0);
        let burst_window = Duration::seconds(self.config.burst_window_secs);
        let burst_count = self
            .store
            .sliding_window_count(&format!("burst:{teacher_id}"), now, burst_window)
            .await
            .unwrap_or(0);

        UsageStats {
            daily: WindowLimitStatus {
                limit: self.config.daily_cap,
                remaining: self.config.daily_cap.saturating_sub(daily_count),
                reset_at: day_start_val + Duration::days(1),
            },
            burst: WindowLimitStatus {
                limit: self.config.burst_cap,
                remaining: self.config.burst_cap.saturating_sub(burst_count),
                reset_at: now + burst_window,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::store::{InMemoryRateLimitStore, UnreachableStore};

    fn gate_with(config: RateLimitConfig, clock: FakeClock) -> RateLimitGate {
        RateLimitGate::new(Arc::new(InMemoryRateLimitStore::new()), Arc::new(clock), config)
    }

    #[tokio::test]
    async fn admits_until_burst_cap_then_denies_naming_burst() {
        let config = RateLimitConfig {
            burst_cap: 2,
            ..RateLimitConfig::default()
        };
        let gate = gate_with(config, FakeClock::at(Utc::now()));

        assert!(gate.check_execution_limit("t1", None).await.allowed);
        assert!(gate.check_execution_limit("t1", None).await.allowed);
        let third = gate.check_execution_limit("t1", None).await;
        assert!(!third.allowed);
        assert_eq!(third.limit_type.as_deref(), Some("burst"));
    }

    #[tokio::test]
    async fn daily_cap_is_independent_per_teacher() {
        let config = RateLimitConfig {
            daily_cap: 1,
            burst_cap: 100,
            ..RateLimitConfig::default()
        };
        let gate = gate_with(config, FakeClock::at(Utc::now()));

        assert!(gate.check_execution_limit("teacher-a", None).await.allowed);
        let denied = gate.check_execution_limit("teacher-a", None).await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit_type.as_deref(), Some("daily"));

        assert!(gate.check_execution_limit("teacher-b", None).await.allowed);
    }

    #[tokio::test]
    async fn hourly_classroom_cap_applies_when_classroom_given() {
        let config = RateLimitConfig {
            hourly_cap: 1,
            burst_cap: 100,
            daily_cap: 100,
            ..RateLimitConfig::default()
        };
        let gate = gate_with(config, FakeClock::at(Utc::now()));

        assert!(gate.check_execution_limit("t1", Some("room-1")).await.allowed);
        let denied = gate.check_execution_limit("t1", Some("room-1")).await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit_type.as_deref(), Some("hourly"));
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        let gate = RateLimitGate::new(
            Arc::new(UnreachableStore),
            Arc::new(FakeClock::at(Utc::now())),
            RateLimitConfig::default(),
        );
        let decision = gate.check_execution_limit("t1", None).await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn burst_window_rolling_forward_restores_capacity() {
        let config = RateLimitConfig {
            burst_cap: 1,
            burst_window_secs: 60,
            ..RateLimitConfig::default()
        };
        let clock = FakeClock::at(Utc::now());
        let gate = gate_with(config, clock.clone());

        assert!(gate.check_execution_limit("t1", None).await.allowed);
        assert!(!gate.check_execution_limit("t1", None).await.allowed);

        clock.advance(Duration::seconds(61));
        assert!(gate.check_execution_limit("t1", None).await.allowed);
    }

    #[tokio::test]
    async fn usage_stats_do_not_consume_quota() {
        let gate = gate_with(RateLimitConfig::default(), FakeClock::at(Utc::now()));
        let before = gate.get_usage_stats("t1").await;
        let after = gate.get_usage_stats("t1").await;
        assert_eq!(before.daily.remaining, after.daily.remaining);
    }

    #[tokio::test]
    async fn ip_limit_denies_after_cap() {
        let config = RateLimitConfig {
            ip_cap: 1,
            ..RateLimitConfig::default()
        };
        let gate = gate_with(config, FakeClock::at(Utc::now()));
        assert!(gate.check_ip_limit("1.2.3.4").await.allowed);
        let denied = gate.check_ip_limit("1.2.3.4").await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit_type.as_deref(), Some("ip"));
    }
}
