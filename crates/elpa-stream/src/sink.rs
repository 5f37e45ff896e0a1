//! Where ordered events actually go: the production SSE adaptor, and an
//! in-memory recorder used by engine tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::event::OrderedStreamEvent;

/// Where a [`crate::manager::StreamManager`] delivers events. Writing to an
/// already-closed sink is always a no-op, never a failure.
#[async_trait]
pub trait StreamSink: Send + Sync {
    async fn send(&self, event: OrderedStreamEvent);

    /// Resolves once the receiving side has gone away — an HTTP client
    /// disconnecting, or a test calling [`RecordingSink::simulate_disconnect`].
    async fn wait_disconnected(&self);

    fn is_closed(&self) -> bool;
}

/// Production adaptor: forwards events over an `mpsc` channel an axum SSE
/// body consumes. Closes itself after a terminal event.
pub struct SseSink {
    sender: mpsc::Sender<OrderedStreamEvent>,
    closed: AtomicBool,
}

impl SseSink {
    /// Returns the sink and the receiver half an axum handler turns into
    /// a `text/event-stream` body.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OrderedStreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                sender: tx,
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }
}

#[async_trait]
impl StreamSink for SseSink {
    async fn send(&self, event: OrderedStreamEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if event.event.is_terminal() {
            self.closed.store(true, Ordering::Release);
        }
        if self.sender.send(event).await.is_err() {
            tracing::debug!("stream receiver dropped; treating sink as closed");
            self.closed.store(true, Ordering::Release);
        }
    }

    async fn wait_disconnected(&self) {
        self.sender.closed().await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// In-memory sink for tests: records every event it receives in order and
/// exposes a [`RecordingSink::simulate_disconnect`] hook.
#[derive(Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<OrderedStreamEvent>>>,
    closed: Arc<AtomicBool>,
    disconnect: Arc<Notify>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            disconnect: Arc::new(Notify::new()),
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrderedStreamEvent> {
        self.events.lock().expect("recording sink mutex poisoned").clone()
    }

    pub fn simulate_disconnect(&self) {
        self.disconnect.notify_waiters();
    }
}

#[async_trait]
impl StreamSink for RecordingSink {
    async fn send(&self, event: OrderedStreamEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if event.event.is_terminal() {
            self.closed.store(true, Ordering::Release);
        }
        self.events.lock().expect("recording sink mutex poisoned").push(event);
    }

    async fn wait_disconnected(&self) {
        self.disconnect.notified().await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamEvent;
    use chrono::Utc;

    fn ordered(order: u64, event: StreamEvent) -> OrderedStreamEvent {
        OrderedStreamEvent { order, event, emitted_at: Utc::now() }
    }

    #[tokio::test]
    async fn recording_sink_closes_after_terminal_event() {
        let sink = RecordingSink::new();
        sink.send(ordered(0, StreamEvent::Progress { progress: 0.5, total_nodes: 2, completed_nodes: 1 })).await;
        assert!(!sink.is_closed());

        sink.send(ordered(1, StreamEvent::Complete { status: "completed".to_string() })).await;
        assert!(sink.is_closed());

        sink.send(ordered(2, StreamEvent::Progress { progress: 1.0, total_nodes: 2, completed_nodes: 2 })).await;
        assert_eq!(sink.events().len(), 2, "write after close must be a no-op");
    }

    #[tokio::test]
    async fn simulate_disconnect_resolves_wait_disconnected() {
        let sink = RecordingSink::new();
        let sink2 = sink.clone();
        let waiter = tokio::spawn(async move {
            sink2.wait_disconnected().await;
        });
        sink.simulate_disconnect();
        waiter.await.unwrap();
    }
}
