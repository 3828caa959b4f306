//! End-to-end scenarios against the public `Gateway` API (spec.md §8), using
//! an in-process test module backed by an unbounded channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use iotedge_gateway_core::{
    ApiVersion, Broker, Gateway, GatewayError, GatewayProperties, LibraryHandle, LinkEntry,
    LinkSource, Loader, LoaderError, LoaderType, Message, ModuleApi, ModuleEntry, ModuleError,
    ModuleInstance,
};
use serde_json::Value;
use tokio::sync::mpsc;

/// A [`Loader`] that hands back an in-process module recorder instead of
/// loading any real code. `entrypoint` is `{"name": "<recorder key>"}`; the
/// test registers a recorder under that key before attaching the module.
struct TestLoader {
    recorders: Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl TestLoader {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            recorders: Mutex::new(HashMap::new()),
        })
    }

    fn register(&self, key: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.recorders.lock().unwrap().insert(key.to_string(), tx);
        rx
    }
}

#[async_trait]
impl Loader for TestLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::Native
    }

    fn name(&self) -> &str {
        "test"
    }

    async fn load(&self, entrypoint: &Value) -> Result<LibraryHandle, LoaderError> {
        let key = entrypoint
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(LibraryHandle::Opaque(Arc::new(key)))
    }

    async fn unload(&self, _handle: LibraryHandle) -> Result<(), LoaderError> {
        Ok(())
    }

    async fn get_api(&self, handle: &LibraryHandle) -> Result<Arc<dyn ModuleApi>, LoaderError> {
        let key = match handle {
            LibraryHandle::Opaque(any) => any
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_default(),
            _ => {
                return Err(LoaderError::MismatchedHandle {
                    loader: "test".to_string(),
                })
            }
        };
        let sender = self
            .recorders
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| LoaderError::GetApi {
                loader: "test".to_string(),
                reason: format!("no recorder registered for `{key}`"),
            })?;
        Ok(Arc::new(TestModuleApi { sender }))
    }
}

struct TestModuleApi {
    sender: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl ModuleApi for TestModuleApi {
    fn api_version(&self) -> ApiVersion {
        ApiVersion::CURRENT
    }

    async fn create(
        &self,
        _broker: Broker,
        _config: Value,
    ) -> Result<Arc<dyn ModuleInstance>, ModuleError> {
        Ok(Arc::new(TestModuleInstance {
            sender: self.sender.clone(),
        }))
    }
}

struct TestModuleInstance {
    sender: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl ModuleInstance for TestModuleInstance {
    async fn receive(&self, message: Message) {
        let _ = self.sender.send(message);
    }
}

fn module_entry(name: &str) -> ModuleEntry {
    ModuleEntry {
        name: name.to_string(),
        loader: "test".to_string(),
        entrypoint: serde_json::json!({ "name": name }),
        args: None,
    }
}

async fn gateway_with_modules(
    loader: &Arc<TestLoader>,
    names: &[&str],
    links: Vec<LinkEntry>,
) -> Gateway {
    let properties = GatewayProperties {
        modules: names.iter().map(|n| module_entry(n)).collect(),
        links,
        loader_registry: None,
    };
    Gateway::create_with_loaders(properties, vec![loader.clone() as Arc<dyn Loader>])
        .await
        .expect("gateway creation should succeed")
}

fn no_message_within(rx: &mut mpsc::UnboundedReceiver<Message>) -> bool {
    rx.try_recv().is_err()
}

#[tokio::test]
async fn single_link_delivery() {
    let loader = TestLoader::new();
    let mut a_rx = loader.register("a");
    let mut b_rx = loader.register("b");

    let gateway = gateway_with_modules(
        &loader,
        &["a", "b"],
        vec![LinkEntry {
            source: LinkSource::Module("a".to_string()),
            sink: "b".to_string(),
        }],
    )
    .await;

    let msg = Message::with_payload(vec![0x01, 0x02]);
    gateway.publish("a", msg.clone()).expect("publish succeeds");

    let received = b_rx.recv().await.expect("b receives the message");
    assert_eq!(received, msg);
    assert!(no_message_within(&mut a_rx));

    gateway.destroy().await;
}

#[tokio::test]
async fn fan_out_wildcard() {
    let loader = TestLoader::new();
    let mut a_rx = loader.register("a");
    let mut b_rx = loader.register("b");
    let mut c_rx = loader.register("c");

    let gateway = gateway_with_modules(
        &loader,
        &["a", "b", "c"],
        vec![LinkEntry {
            source: LinkSource::Any,
            sink: "c".to_string(),
        }],
    )
    .await;

    let m1 = Message::with_payload(vec![1]);
    let m2 = Message::with_payload(vec![2]);
    gateway.publish("a", m1.clone()).expect("publish succeeds");
    gateway.publish("b", m2.clone()).expect("publish succeeds");

    let mut seen = vec![c_rx.recv().await.expect("first message"), c_rx.recv().await.expect("second message")];
    seen.sort_by_key(|m| m.payload().to_vec());
    assert_eq!(seen, vec![m1, m2]);
    assert!(no_message_within(&mut a_rx));
    assert!(no_message_within(&mut b_rx));

    gateway.destroy().await;
}

#[tokio::test]
async fn self_loop_suppressed_under_wildcard() {
    let loader = TestLoader::new();
    let mut a_rx = loader.register("a");
    let mut b_rx = loader.register("b");

    let gateway = gateway_with_modules(
        &loader,
        &["a", "b"],
        vec![LinkEntry {
            source: LinkSource::Any,
            sink: "b".to_string(),
        }],
    )
    .await;

    gateway
        .publish("b", Message::with_payload(vec![9]))
        .expect("publish succeeds");

    assert!(no_message_within(&mut a_rx));
    assert!(no_message_within(&mut b_rx));

    gateway.destroy().await;
}

#[tokio::test]
async fn late_module_retroactively_links_to_wildcard() {
    let loader = TestLoader::new();
    let _a_rx = loader.register("a");
    let mut c_rx = loader.register("c");

    let gateway = gateway_with_modules(
        &loader,
        &["a", "c"],
        vec![LinkEntry {
            source: LinkSource::Any,
            sink: "c".to_string(),
        }],
    )
    .await;

    let b_rx = loader.register("b");
    let _ = b_rx;
    gateway
        .add_module(module_entry("b"))
        .await
        .expect("late attach succeeds");

    let msg = Message::with_payload(vec![7]);
    gateway.publish("b", msg.clone()).expect("publish succeeds");
    let received = c_rx.recv().await.expect("c receives b's publish");
    assert_eq!(received, msg);

    gateway.destroy().await;
}

#[tokio::test]
async fn cascading_removal() {
    let loader = TestLoader::new();
    let mut a_rx = loader.register("a");
    let _b_rx = loader.register("b");
    let mut c_rx = loader.register("c");

    let gateway = gateway_with_modules(
        &loader,
        &["a", "b", "c"],
        vec![
            LinkEntry {
                source: LinkSource::Module("a".to_string()),
                sink: "b".to_string(),
            },
            LinkEntry {
                source: LinkSource::Module("b".to_string()),
                sink: "c".to_string(),
            },
        ],
    )
    .await;

    gateway.remove_module("b").await.expect("remove succeeds");
    assert!(gateway.has_module("a"));
    assert!(gateway.has_module("c"));
    assert!(!gateway.has_module("b"));

    gateway
        .publish("a", Message::with_payload(vec![1]))
        .expect("publish succeeds");
    assert!(no_message_within(&mut a_rx));
    assert!(no_message_within(&mut c_rx));

    gateway.destroy().await;
}

#[tokio::test]
async fn duplicate_module_rejected() {
    let loader = TestLoader::new();
    let _rx = loader.register("x");

    let gateway = gateway_with_modules(&loader, &["x"], Vec::new()).await;
    let err = gateway.add_module(module_entry("x")).await.unwrap_err();
    assert!(matches!(err, GatewayError::DuplicateModule { .. }));
    assert_eq!(gateway.module_count(), 1);

    gateway.destroy().await;
}

#[tokio::test]
async fn wildcard_name_rejected() {
    let loader = TestLoader::new();
    let gateway = gateway_with_modules(&loader, &[], Vec::new()).await;
    let err = gateway.add_module(module_entry("*")).await.unwrap_err();
    assert!(matches!(err, GatewayError::ReservedWildcardName));
    gateway.destroy().await;
}

#[tokio::test]
async fn broker_ref_count_matches_attached_modules_plus_gateway() {
    let loader = TestLoader::new();
    let _a_rx = loader.register("a");
    let gateway = gateway_with_modules(&loader, &["a"], Vec::new()).await;
    assert_eq!(gateway.broker_ref_count(), 2);
    gateway.destroy().await;
}
