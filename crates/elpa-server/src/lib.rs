//! Axum HTTP layer for the adaptive learning orchestrator: the execute
//! endpoint, its SSE response, rate-limit admission, and the in-memory
//! persistence/AI stand-ins the engine treats as external collaborators.

pub mod ai;
pub mod api;
pub mod config;
pub mod error;
pub mod persistence;
pub mod state;
pub mod stream_observer;

pub use ai::StubAiClient;
pub use api::routes::create_router;
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use persistence::{InMemoryPersistence, Persistence};
pub use state::AppState;
