//! The publish/dispatch engine (spec.md §4.1): one worker per attached
//! module, a directed `(publisher, subscriber)` link table, and reference
//! counting shared between the gateway and every attached module.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::broker::error::BrokerError;
use crate::mailbox::{bounded, QueueItem, QueueSender, DEFAULT_QUEUE_CAPACITY};
use crate::message::Message;
use crate::module::ModuleInstance;

/// Per-module state machine: `Attached → Draining → Detached` (spec.md
/// §4.1). `Detached` is not represented — the slot is simply removed from
/// [`BrokerInner::modules`] once the worker has joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleState {
    Attached,
    Draining,
}

struct ModuleSlot {
    sender: QueueSender,
    worker: tokio::task::JoinHandle<()>,
    state: RwLock<ModuleState>,
}

struct BrokerInner {
    modules: DashMap<String, ModuleSlot>,
    links: RwLock<HashSet<(String, String)>>,
    ref_count: AtomicUsize,
}

/// Cheap-to-clone handle to the broker's shared state. The gateway holds one
/// stake via [`Broker::create`]; each attached module implicitly holds one
/// more for the duration it is registered (spec.md's invariant: "broker
/// reference count = attached modules + 1 while the gateway is alive").
#[derive(Clone)]
pub struct Broker(Arc<BrokerInner>);

impl Broker {
    /// Produces an empty broker with reference count 1.
    pub fn create() -> Result<Self, BrokerError> {
        Ok(Self(Arc::new(BrokerInner {
            modules: DashMap::new(),
            links: RwLock::new(HashSet::new()),
            ref_count: AtomicUsize::new(1),
        })))
    }

    /// Registers `instance` under `name`, spawning its dedicated worker task
    /// and bounded inbound queue.
    pub fn add_module(
        &self,
        name: impl Into<String>,
        instance: Arc<dyn ModuleInstance>,
    ) -> Result<(), BrokerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BrokerError::Invalid {
                reason: "module name must not be empty".to_string(),
            });
        }
        if self.0.modules.contains_key(&name) {
            return Err(BrokerError::Duplicate { name });
        }

        let (sender, mut receiver) = bounded(DEFAULT_QUEUE_CAPACITY);
        let worker_name = name.clone();
        let worker = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Some(QueueItem::Deliver(message)) => {
                        let receive = instance.receive(message);
                        if let Err(panic) = AssertUnwindSafe(receive).catch_unwind().await {
                            error!(
                                module = %worker_name,
                                panic = %panic_message(&panic),
                                "module receive() panicked; worker continues servicing its queue"
                            );
                        }
                    }
                    Some(QueueItem::Exit) | None => break,
                }
            }
            debug!(module = %worker_name, "broker worker exiting");
        });

        self.0.modules.insert(
            name.clone(),
            ModuleSlot {
                sender,
                worker,
                state: RwLock::new(ModuleState::Attached),
            },
        );
        self.0.ref_count.fetch_add(1, Ordering::AcqRel);
        info!(module = %name, "module attached to broker");
        Ok(())
    }

    /// Signals the module's worker to drain and exit, joins it, and removes
    /// every link mentioning it. Idempotent: removing an absent module
    /// reports `NotFound` without side effects.
    ///
    /// The slot stays in [`BrokerInner::modules`] through `Draining` so that
    /// `publish` can still see it and reject further enqueues (spec.md §4.1)
    /// — it is only removed once the worker has actually joined.
    pub async fn remove_module(&self, name: &str) -> Result<(), BrokerError> {
        let sender = {
            let slot = self
                .0
                .modules
                .get(name)
                .ok_or_else(|| BrokerError::NotFound {
                    name: name.to_string(),
                })?;
            if *slot.state.read() == ModuleState::Draining {
                return Err(BrokerError::NotFound {
                    name: name.to_string(),
                });
            }
            *slot.state.write() = ModuleState::Draining;
            slot.sender.clone()
        };

        sender.post_exit().await;

        let (_, slot) = self
            .0
            .modules
            .remove(name)
            .ok_or_else(|| BrokerError::NotFound {
                name: name.to_string(),
            })?;
        if let Err(join_err) = slot.worker.await {
            warn!(module = %name, error = %join_err, "broker worker task did not join cleanly");
        }

        self.0.links.write().retain(|(p, s)| p != name && s != name);
        self.0.ref_count.fetch_sub(1, Ordering::AcqRel);
        info!(module = %name, "module detached from broker");
        Ok(())
    }

    /// Adds a `(publisher, subscriber)` edge. Fails if it already exists.
    pub fn add_link(&self, publisher: &str, subscriber: &str) -> Result<(), BrokerError> {
        let inserted = self
            .0
            .links
            .write()
            .insert((publisher.to_string(), subscriber.to_string()));
        if !inserted {
            return Err(BrokerError::InvalidLink {
                publisher: publisher.to_string(),
                subscriber: subscriber.to_string(),
                reason: "already exists",
            });
        }
        debug!(publisher, subscriber, "broker link added");
        Ok(())
    }

    /// Removes a `(publisher, subscriber)` edge. Fails if it is absent.
    pub fn remove_link(&self, publisher: &str, subscriber: &str) -> Result<(), BrokerError> {
        let removed = self
            .0
            .links
            .write()
            .remove(&(publisher.to_string(), subscriber.to_string()));
        if !removed {
            return Err(BrokerError::InvalidLink {
                publisher: publisher.to_string(),
                subscriber: subscriber.to_string(),
                reason: "does not exist",
            });
        }
        debug!(publisher, subscriber, "broker link removed");
        Ok(())
    }

    /// Enqueues `message` on every subscriber linked from `publisher`. A
    /// full subscriber queue drops the message for that subscriber only;
    /// `publish` still reports success (spec.md §4.1).
    pub fn publish(&self, publisher: &str, message: Message) -> Result<(), BrokerError> {
        let subscribers: Vec<String> = self
            .0
            .links
            .read()
            .iter()
            .filter(|(p, _)| p == publisher)
            .map(|(_, s)| s.clone())
            .collect();

        for subscriber in subscribers {
            if let Some(slot) = self.0.modules.get(&subscriber) {
                // `Draining`: the exit sentinel has already been posted, so
                // the queue rejects further enqueues even though the worker
                // is still alive servicing what's left of it (spec.md §4.1).
                if *slot.state.read() != ModuleState::Attached {
                    debug!(publisher, subscriber = %subscriber, "subscriber is draining, message dropped");
                    continue;
                }
                if !slot.sender.try_enqueue(message.clone()) {
                    warn!(publisher, subscriber = %subscriber, "subscriber queue full, message dropped");
                }
            }
        }
        Ok(())
    }

    /// Adds one reference-count stake (the gateway's own hold).
    pub fn inc_ref(&self) {
        self.0.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases one reference-count stake, returning the count afterward.
    pub fn dec_ref(&self) -> usize {
        self.0.ref_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Current reference count: attached modules plus any external holds.
    pub fn ref_count(&self) -> usize {
        self.0.ref_count.load(Ordering::Acquire)
    }

    /// Whether a module by this name is currently attached.
    pub fn is_attached(&self, name: &str) -> bool {
        self.0.modules.contains_key(name)
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
