//! Per-execution ordered event channel: stamps a monotonic order on every
//! event and owns the cancellation token a disconnect watcher trips.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::event::{OrderedStreamEvent, StreamEvent};
use crate::sink::StreamSink;

/// Owns the order counter and the sink for one execution. Not shared
/// across executions.
pub struct StreamManager {
    sink: Arc<dyn StreamSink>,
    order: AtomicU64,
    cancel_token: CancellationToken,
}

impl StreamManager {
    pub fn new(sink: Arc<dyn StreamSink>) -> Self {
        Self {
            sink,
            order: AtomicU64::new(0),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token the scheduler checks at node boundaries; cancelled by
    /// [`StreamManager::watch_for_disconnect`] or directly by a caller.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stamp and deliver an event. A no-op if the sink already closed.
    pub async fn emit(&self, event: StreamEvent) {
        let order = self.order.fetch_add(1, Ordering::SeqCst);
        self.sink
            .send(OrderedStreamEvent {
                order,
                event,
                emitted_at: Utc::now(),
            })
            .await;
    }

    /// Spawn this as a background task: once the sink's receiver goes
    /// away, cancel the token so the scheduler stops at its next
    /// boundary check.
    pub async fn watch_for_disconnect(&self) {
        self.sink.wait_disconnected().await;
        tracing::debug!("stream consumer disconnected; cancelling execution");
        self.cancel_token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    #[tokio::test]
    async fn events_are_stamped_in_emission_order() {
        let sink = Arc::new(RecordingSink::new());
        let manager = StreamManager::new(sink.clone());

        manager.emit(StreamEvent::NodeStart { node_id: "a".into(), node_type: "k".into(), label: None }).await;
        manager.emit(StreamEvent::NodeComplete { node_id: "a".into(), output: serde_json::json!({}) }).await;
        manager.emit(StreamEvent::Complete { status: "completed".to_string() }).await;

        let events = sink.events();
        let orders: Vec<u64> = events.iter().map(|e| e.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn disconnect_cancels_the_token() {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(StreamManager::new(sink.clone()));
        let token = manager.cancel_token();

        let watcher = manager.clone();
        let handle = tokio::spawn(async move { watcher.watch_for_disconnect().await });

        assert!(!token.is_cancelled());
        sink.simulate_disconnect();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }
}
