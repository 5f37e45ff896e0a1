//! Shared application state — the one `Clone`-able handle every handler
//! extracts via `State`.

use std::sync::Arc;

use dashmap::DashMap;
use elpa_engine::{ExecutionControl, ExecutionFacade};
use elpa_ratelimit::{Clock, InMemoryRateLimitStore, RateLimitGate, RateLimitStore, SystemClock};
use elpa_runners::{builtin_registry, AiClient, NodeRunnerRegistry};
use elpa_stream::StreamManager;

use crate::config::ServerConfig;
use crate::persistence::Persistence;

/// One still-open execution's facade, stream, and cancellation handle,
/// kept around so a later `/resume`, `/pause`, or `/cancel` call acts on
/// the same run a live SSE connection is attached to, rather than
/// starting a new one. The facade is created fresh per execution (its
/// `runs` map and `observer` are scoped to a single run) rather than
/// shared across the server, since `ExecutionObserver` carries no
/// execution id of its own to multiplex on.
pub struct ActiveExecution {
    pub facade: Arc<ExecutionFacade>,
    pub stream: Arc<StreamManager>,
    pub control: ExecutionControl,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<NodeRunnerRegistry>,
    pub rate_limit: Arc<RateLimitGate>,
    pub persistence: Arc<dyn Persistence>,
    pub active: Arc<DashMap<String, ActiveExecution>>,
}

impl AppState {
    pub fn new(config: ServerConfig, ai: Arc<dyn AiClient>, persistence: Arc<dyn Persistence>) -> Self {
        Self::with_rate_limit_store(config, ai, persistence, Arc::new(InMemoryRateLimitStore::new()), Arc::new(SystemClock))
    }

    pub fn with_rate_limit_store(
        config: ServerConfig,
        ai: Arc<dyn AiClient>,
        persistence: Arc<dyn Persistence>,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limit = RateLimitGate::new(store, clock, config.rate_limit.clone());
        Self {
            registry: Arc::new(builtin_registry(ai)),
            rate_limit: Arc::new(rate_limit),
            persistence,
            active: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }
}
