//! The gateway graph manager (spec.md §4.2): owns the module registry and
//! the declared link set, keeps the broker's link table consistent with
//! that topology — including the `*` wildcard source's retroactive
//! materialization — and stages lifecycle transitions so no half-built
//! gateway is ever observable.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::gateway::error::GatewayError;
use crate::gateway::events::{self, GatewayNotification, GatewaySubscription};
use crate::gateway::types::{is_wildcard, GatewayLink, GatewayProperties, LinkEntry, LinkSource, ModuleEntry};
use crate::loader::LoaderRegistry;
use crate::module::ModuleInstance;
use crate::monitoring::GatewayEventKind;

struct ModuleRecord {
    loader: Arc<dyn crate::loader::Loader>,
    library_handle: Option<crate::loader::LibraryHandle>,
    instance: Arc<dyn ModuleInstance>,
}

pub(crate) struct GatewayInner {
    broker: Broker,
    modules: DashMap<String, ModuleRecord>,
    links: RwLock<HashSet<GatewayLink>>,
    loader_registry: Arc<LoaderRegistry>,
    events: tokio::sync::broadcast::Sender<GatewayNotification>,
}

/// The user-facing composition of broker + modules + links + events +
/// loader registry usage (spec.md §2).
///
/// Cheap to clone — an `Arc`-backed handle like every other shared type in
/// this crate. Graph-mutation calls (`add_module`, `remove_module`,
/// `add_link`, `remove_link`, `destroy`) are **not** safe to issue
/// concurrently against the same `Gateway` (spec.md §5): the caller must
/// serialize them, typically by holding the only clone on one task or
/// behind its own mutex.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Builds a broker, module registry, link set, and event channel, then
    /// adds every module and link in `properties` in order. If any addition
    /// fails, everything already built is torn down and the failure is
    /// returned — no half-initialised gateway is ever observable (spec.md
    /// §4.2).
    pub async fn create(properties: GatewayProperties) -> Result<Self, GatewayError> {
        Self::create_with_loaders(properties, Vec::new()).await
    }

    /// As [`Gateway::create`], but also registers `extra_loaders` into the
    /// loader registry before any module is added. This is the seam an
    /// embedder uses to make a programmatically constructed [`Loader`]
    /// (one with no JSON-configurable [`crate::loader::LoaderType`], such as
    /// an in-process test double) available under its own name without
    /// going through `loader_registry`'s JSON augmentation array.
    pub async fn create_with_loaders(
        properties: GatewayProperties,
        extra_loaders: Vec<Arc<dyn crate::loader::Loader>>,
    ) -> Result<Self, GatewayError> {
        let loader_registry = Arc::new(LoaderRegistry::new());
        loader_registry.initialize();
        if let Some(entries) = &properties.loader_registry {
            loader_registry.initialize_from_json(entries)?;
        }
        for loader in extra_loaders {
            loader_registry.register(loader);
        }

        let broker = Broker::create()?;
        let (sender, _receiver) = events::channel();

        let gateway = Self {
            inner: Arc::new(GatewayInner {
                broker,
                modules: DashMap::new(),
                links: RwLock::new(HashSet::new()),
                loader_registry,
                events: sender,
            }),
        };

        for entry in properties.modules {
            if let Err(err) = gateway.add_module(entry).await {
                gateway.destroy().await;
                return Err(err);
            }
        }
        for link in properties.links {
            if let Err(err) = gateway.add_link(link).await {
                gateway.destroy().await;
                return Err(err);
            }
        }

        gateway.emit(GatewayEventKind::Created);
        gateway.emit(GatewayEventKind::ModuleListChanged);
        info!("gateway created");
        Ok(gateway)
    }

    /// Validates `entry`, resolves its loader, and runs the `Load → GetApi →
    /// parse_configuration_from_json → BuildModuleConfiguration → Create`
    /// chain (spec.md §4.3). On success, retroactively materialises broker
    /// edges for every existing wildcard link. Any failure unwinds
    /// everything this call allocated.
    pub async fn add_module(&self, entry: ModuleEntry) -> Result<(), GatewayError> {
        if entry.name.is_empty() {
            return Err(GatewayError::EmptyName);
        }
        if is_wildcard(&entry.name) {
            return Err(GatewayError::ReservedWildcardName);
        }
        if self.inner.modules.contains_key(&entry.name) {
            return Err(GatewayError::DuplicateModule { name: entry.name });
        }

        let loader = self
            .inner
            .loader_registry
            .find_by_name(&entry.loader)
            .ok_or_else(|| GatewayError::LoaderNotFound {
                name: entry.loader.clone(),
            })?;

        let library_handle = loader.load(&entry.entrypoint).await?;

        let module_api = match loader.get_api(&library_handle).await {
            Ok(api) => api,
            Err(err) => {
                let _ = loader.unload(library_handle).await;
                return Err(err.into());
            }
        };

        let module_config_text = entry
            .args
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let module_config = match module_api.parse_configuration_from_json(&module_config_text) {
            Ok(config) => config,
            Err(err) => {
                let _ = loader.unload(library_handle).await;
                return Err(err.into());
            }
        };

        let final_config: Value =
            match loader.build_module_configuration(&entry.entrypoint, module_config) {
                Ok(config) => config,
                Err(err) => {
                    let _ = loader.unload(library_handle).await;
                    return Err(err.into());
                }
            };

        let instance = match module_api.create(self.inner.broker.clone(), final_config).await {
            Ok(instance) => instance,
            Err(err) => {
                let _ = loader.unload(library_handle).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.inner.broker.add_module(entry.name.clone(), Arc::clone(&instance)) {
            let _ = loader.unload(library_handle).await;
            return Err(err.into());
        }

        self.inner.modules.insert(
            entry.name.clone(),
            ModuleRecord {
                loader,
                library_handle: Some(library_handle),
                instance,
            },
        );

        // Retroactively materialise wildcard links: this module becomes a
        // new source for every existing `(ANY, sink)` link (spec.md §4.2).
        let wildcard_sinks: Vec<String> = self
            .inner
            .links
            .read()
            .iter()
            .filter(|link| link.source == LinkSource::Any && link.sink != entry.name)
            .map(|link| link.sink.clone())
            .collect();
        for sink in wildcard_sinks {
            match self.inner.broker.add_link(&entry.name, &sink) {
                Ok(()) | Err(crate::broker::BrokerError::InvalidLink { .. }) => {}
                Err(other) => return Err(other.into()),
            }
        }

        self.emit(GatewayEventKind::ModuleListChanged);
        info!(module = %entry.name, "module added to gateway");
        Ok(())
    }

    /// Reverse of [`Gateway::add_module`]: drops every gateway link
    /// mentioning `name`, detaches it from the broker (which cleans its own
    /// link table for every edge touching `name` in one pass), and releases
    /// it through its loader.
    pub async fn remove_module(&self, name: &str) -> Result<(), GatewayError> {
        let (_, mut record) = self
            .inner
            .modules
            .remove(name)
            .ok_or_else(|| GatewayError::ModuleNotFound {
                name: name.to_string(),
            })?;

        self.inner.links.write().retain(|link| {
            let mentions_as_sink = link.sink == name;
            let mentions_as_source = matches!(&link.source, LinkSource::Module(source) if source == name);
            !(mentions_as_sink || mentions_as_source)
        });

        self.inner.broker.remove_module(name).await?;

        if let Some(handle) = record.library_handle.take() {
            if let Err(err) = record.loader.unload(handle).await {
                warn!(module = %name, error = %err, "loader failed to unload module's library; continuing");
            }
        }

        self.emit(GatewayEventKind::ModuleListChanged);
        info!(module = %name, "module removed from gateway");
        Ok(())
    }

    /// Adds a link. A `*`-sourced entry materialises a concrete broker edge
    /// from every currently attached module (except the sink itself);
    /// otherwise both endpoints must already be attached. Rejects a
    /// duplicate under spec.md §4.2's link-equality rule; tolerates (rather
    /// than errors on) broker-level materialization overlap between a
    /// wildcard link and a regular link sharing the same edge (spec.md §9).
    pub async fn add_link(&self, entry: LinkEntry) -> Result<(), GatewayError> {
        if !self.inner.modules.contains_key(&entry.sink) {
            return Err(GatewayError::LinkEndpointNotFound {
                name: entry.sink.clone(),
            });
        }

        let candidate: GatewayLink = entry.clone().into();
        if self.inner.links.read().contains(&candidate) {
            return Err(GatewayError::DuplicateLink);
        }

        match &entry.source {
            LinkSource::Any => {
                let sources: Vec<String> = self
                    .inner
                    .modules
                    .iter()
                    .map(|kv| kv.key().clone())
                    .filter(|name| *name != entry.sink)
                    .collect();
                for source in sources {
                    self.materialize_edge(&source, &entry.sink)?;
                }
            }
            LinkSource::Module(source) => {
                if !self.inner.modules.contains_key(source) {
                    return Err(GatewayError::LinkEndpointNotFound {
                        name: source.clone(),
                    });
                }
                self.materialize_edge(source, &entry.sink)?;
            }
        }

        self.inner.links.write().insert(candidate);
        info!(source = ?entry.source, sink = %entry.sink, "link added to gateway");
        Ok(())
    }

    fn materialize_edge(&self, source: &str, sink: &str) -> Result<(), GatewayError> {
        if source == sink {
            return Ok(());
        }
        match self.inner.broker.add_link(source, sink) {
            Ok(()) | Err(crate::broker::BrokerError::InvalidLink { .. }) => Ok(()),
            Err(other) => Err(other.into()),
        }
    }

    /// Removes a link. Tears down every broker edge it materialised, unless
    /// another still-present gateway link independently needs that same
    /// edge (the wildcard/regular overlap spec.md §9 describes).
    pub async fn remove_link(&self, entry: LinkEntry) -> Result<(), GatewayError> {
        let candidate: GatewayLink = entry.clone().into();
        let removed = self.inner.links.write().remove(&candidate);
        if !removed {
            return Err(GatewayError::LinkNotFound);
        }

        match &entry.source {
            LinkSource::Any => {
                let sources: Vec<String> = self
                    .inner
                    .modules
                    .iter()
                    .map(|kv| kv.key().clone())
                    .filter(|name| *name != entry.sink)
                    .collect();
                for source in sources {
                    self.dematerialize_edge(&source, &entry.sink);
                }
            }
            LinkSource::Module(source) => {
                self.dematerialize_edge(source, &entry.sink);
            }
        }

        info!(source = ?entry.source, sink = %entry.sink, "link removed from gateway");
        Ok(())
    }

    fn dematerialize_edge(&self, source: &str, sink: &str) {
        let still_needed = {
            let links = self.inner.links.read();
            links.contains(&GatewayLink {
                source: LinkSource::Module(source.to_string()),
                sink: sink.to_string(),
            }) || links.contains(&GatewayLink {
                source: LinkSource::Any,
                sink: sink.to_string(),
            })
        };
        if still_needed {
            return;
        }
        match self.inner.broker.remove_link(source, sink) {
            Ok(()) | Err(crate::broker::BrokerError::InvalidLink { .. }) => {}
            Err(other) => warn!(source, sink, error = %other, "failed to remove broker edge"),
        }
    }

    /// Signals every attached module that the full graph now exists
    /// (spec.md §4.3's `start`). A single module's `start` failing is
    /// logged and does not prevent the remaining modules from starting.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let instances: Vec<(String, Arc<dyn ModuleInstance>)> = self
            .inner
            .modules
            .iter()
            .map(|kv| (kv.key().clone(), Arc::clone(&kv.value().instance)))
            .collect();
        for (name, instance) in instances {
            if let Err(err) = instance.start().await {
                warn!(module = %name, error = %err, "module start() failed; continuing");
            }
        }
        Ok(())
    }

    /// Publishes `message` as `publisher`. A thin pass-through to the
    /// broker — the gateway itself routes nothing.
    pub fn publish(&self, publisher: &str, message: crate::message::Message) -> Result<(), GatewayError> {
        self.inner.broker.publish(publisher, message).map_err(Into::into)
    }

    /// Subscribes to `Created`/`Destroyed`/`ModuleListChanged` lifecycle
    /// events (spec.md §6).
    pub fn subscribe(&self) -> GatewaySubscription {
        GatewaySubscription {
            receiver: self.inner.events.subscribe(),
        }
    }

    /// Tears the gateway down: emits `Destroyed`, removes every link, then
    /// every module, then releases the broker's own reference-count hold
    /// and the loader registry. Best-effort — a failure removing any one
    /// link or module is logged and does not stop the rest from tearing
    /// down (spec.md §4.2).
    pub async fn destroy(&self) {
        self.emit(GatewayEventKind::Destroyed);

        let links: Vec<LinkEntry> = self
            .inner
            .links
            .read()
            .iter()
            .map(|link| LinkEntry {
                source: link.source.clone(),
                sink: link.sink.clone(),
            })
            .collect();
        for link in links {
            if let Err(err) = self.remove_link(link).await {
                warn!(error = %err, "failed to remove link during gateway destroy; continuing");
            }
        }

        let module_names: Vec<String> = self.inner.modules.iter().map(|kv| kv.key().clone()).collect();
        for name in module_names {
            if let Err(err) = self.remove_module(&name).await {
                warn!(module = %name, error = %err, "failed to remove module during gateway destroy; continuing");
            }
        }

        self.inner.broker.dec_ref();
        self.inner.loader_registry.destroy();
        info!("gateway destroyed");
    }

    /// Whether a module by this name is currently attached.
    pub fn has_module(&self, name: &str) -> bool {
        self.inner.modules.contains_key(name)
    }

    /// Number of attached modules.
    pub fn module_count(&self) -> usize {
        self.inner.modules.len()
    }

    /// The broker's own reference count (spec.md §3's invariant: attached
    /// modules plus one while the gateway is alive).
    pub fn broker_ref_count(&self) -> usize {
        self.inner.broker.ref_count()
    }

    fn emit(&self, kind: GatewayEventKind) {
        events::notify(&self.inner.events, Arc::downgrade(&self.inner), kind);
    }
}
