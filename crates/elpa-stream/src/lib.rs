//! Per-execution ordered stream of node-lifecycle events, with typed
//! payloads, SSE wire framing, and disconnect detection.

pub mod event;
pub mod manager;
pub mod sink;

pub use event::{OrderedStreamEvent, StreamEvent};
pub use manager::StreamManager;
pub use sink::{RecordingSink, SseSink, StreamSink};
