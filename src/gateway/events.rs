//! The gateway's event subscription surface (spec.md §6): a closed enum of
//! lifecycle events, delivered best-effort to subscribers that receive a
//! weak reference to the gateway alongside the event tag.

use std::sync::Weak;

use tokio::sync::broadcast;
use tracing::trace;

use crate::gateway::gateway::GatewayInner;
use crate::monitoring::GatewayEventKind;

/// A non-owning handle to a gateway, handed to every event subscriber
/// alongside the event tag (spec.md §6) so a subscriber can act on the
/// gateway without extending its lifetime.
#[derive(Clone)]
pub struct WeakGateway {
    pub(crate) inner: Weak<GatewayInner>,
}

impl WeakGateway {
    /// Attempts to recover a live [`crate::gateway::Gateway`] handle. Returns
    /// `None` once the gateway has fully torn down.
    pub fn upgrade(&self) -> Option<crate::gateway::Gateway> {
        self.inner.upgrade().map(|inner| crate::gateway::Gateway { inner })
    }
}

/// One delivered notification: the event tag plus a weak reference to the
/// gateway that emitted it.
#[derive(Clone)]
pub struct GatewayNotification {
    pub gateway: WeakGateway,
    pub event: GatewayEventKind,
}

/// The channel capacity for the gateway's lifecycle event broadcast. A
/// lagging subscriber simply misses events rather than blocking the
/// publisher — this is what spec.md §6's "delivery is best-effort" means
/// in practice on a `tokio::sync::broadcast` channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub(crate) fn channel() -> (
    broadcast::Sender<GatewayNotification>,
    broadcast::Receiver<GatewayNotification>,
) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// An active subscription to a gateway's lifecycle events. Dropping it
/// unsubscribes — `tokio::sync::broadcast` removes a receiver from the
/// channel's subscriber count as soon as it is dropped, so no explicit
/// unsubscribe call is needed.
pub struct GatewaySubscription {
    pub(crate) receiver: broadcast::Receiver<GatewayNotification>,
}

impl GatewaySubscription {
    /// Awaits the next notification. Returns `None` once the gateway has
    /// been destroyed and every sender has dropped.
    pub async fn recv(&mut self) -> Option<GatewayNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "gateway event subscriber lagged; events were dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for GatewaySubscription {
    fn drop(&mut self) {
        trace!("gateway event subscriber unsubscribed");
    }
}

pub(crate) fn notify(
    sender: &broadcast::Sender<GatewayNotification>,
    weak: Weak<GatewayInner>,
    event: GatewayEventKind,
) {
    // `send` only errors when there are zero receivers; that is a normal,
    // non-fatal state (spec.md §6: "delivery is best-effort").
    let _ = sender.send(GatewayNotification {
        gateway: WeakGateway { inner: weak },
        event,
    });
}
