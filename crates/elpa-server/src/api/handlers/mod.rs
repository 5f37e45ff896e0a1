//! Request handlers for the execute/stream/control/usage surface.

pub mod control;
pub mod execute;
pub mod health;
pub mod rate_limit;

pub use control::{cancel_execution, get_execution_status, pause_execution, resume_execution};
pub use execute::execute;
pub use health::health;
pub use rate_limit::usage_stats;
