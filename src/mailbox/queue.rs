//! The bounded, per-module inbound queue described in spec.md §4.1.
//!
//! Every attached module gets exactly one queue and one worker reading from
//! it. `publish` enqueues are non-blocking: on overflow the message is
//! dropped for that subscriber and the drop is recorded, but `publish`
//! itself still reports success to the caller (spec.md §4.1 "Backpressure").

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::mailbox::metrics::QueueMetrics;
use crate::message::Message;

/// Recommended bounded-queue capacity (`Q` in spec.md §4.1). A deliberate
/// design parameter, not derived from any measurement — spec.md §9 leaves it
/// as "implementation-chosen".
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What the worker reads: either a message to deliver, or the exit sentinel
/// that transitions the module from `Draining` to `Detached`.
pub(crate) enum QueueItem {
    Deliver(Message),
    Exit,
}

/// Producer handle held by the broker; `publish` clones it per subscriber.
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<QueueItem>,
    metrics: Arc<QueueMetrics>,
}

/// Consumer handle owned by a module's dedicated worker task.
pub struct QueueReceiver {
    rx: mpsc::Receiver<QueueItem>,
    metrics: Arc<QueueMetrics>,
}

/// Builds a bounded queue pair with capacity `Q`.
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let metrics = Arc::new(QueueMetrics::new());
    (
        QueueSender {
            tx,
            metrics: metrics.clone(),
        },
        QueueReceiver { rx, metrics },
    )
}

impl QueueSender {
    /// Non-blocking enqueue. Returns `true` if the message was accepted,
    /// `false` if it was dropped because the queue was full or the worker
    /// has already exited.
    pub fn try_enqueue(&self, message: Message) -> bool {
        match self.tx.try_send(QueueItem::Deliver(message)) {
            Ok(()) => {
                self.metrics.record_enqueued();
                true
            }
            Err(_) => {
                self.metrics.record_dropped();
                false
            }
        }
    }

    /// Posts the exit sentinel, transitioning the queue to `Draining`. Uses
    /// the async send so the sentinel is never itself dropped on overflow —
    /// the worker must always be able to observe shutdown.
    pub async fn post_exit(&self) {
        let _ = self.tx.send(QueueItem::Exit).await;
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

impl QueueReceiver {
    /// Blocks until the next item arrives. Returns `None` only if every
    /// sender has dropped without posting `Exit` (should not happen through
    /// the broker's normal lifecycle, but is handled defensively).
    pub(crate) async fn recv(&mut self) -> Option<QueueItem> {
        let item = self.rx.recv().await;
        if matches!(item, Some(QueueItem::Deliver(_))) {
            self.metrics.record_delivered();
        }
        item
    }
}
