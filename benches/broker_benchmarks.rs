//! Broker publish/dispatch throughput benchmarks (spec.md §4.1):
//! - Point-to-point publish/deliver latency
//! - Sustained single-link throughput
//! - Fan-out to 10 subscribers via the wildcard source

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, Criterion};
use iotedge_gateway_core::broker::Broker;
use iotedge_gateway_core::message::Message;
use iotedge_gateway_core::module::ModuleInstance;
use tokio::sync::Notify;

struct CountingModule {
    count: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

#[async_trait]
impl ModuleInstance for CountingModule {
    async fn receive(&self, _message: Message) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

fn publish_deliver_roundtrip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("broker_publish_deliver_roundtrip", |b| {
        b.to_async(&rt).iter(|| async {
            let broker = Broker::create().unwrap();
            let count = Arc::new(AtomicUsize::new(0));
            let notify = Arc::new(Notify::new());
            broker
                .add_module(
                    "sink",
                    Arc::new(CountingModule {
                        count: count.clone(),
                        notify: notify.clone(),
                    }) as Arc<dyn ModuleInstance>,
                )
                .unwrap();
            broker.add_link("source", "sink").unwrap();

            broker.publish("source", Message::with_payload(vec![0x01])).unwrap();
            notify.notified().await;

            broker.remove_module("sink").await.unwrap();
            black_box(count.load(Ordering::SeqCst));
        });
    });
}

fn sustained_single_link_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("broker_sustained_single_link_throughput", |b| {
        b.to_async(&rt).iter(|| async {
            let broker = Broker::create().unwrap();
            let count = Arc::new(AtomicUsize::new(0));
            let notify = Arc::new(Notify::new());
            broker
                .add_module(
                    "sink",
                    Arc::new(CountingModule {
                        count: count.clone(),
                        notify: notify.clone(),
                    }) as Arc<dyn ModuleInstance>,
                )
                .unwrap();
            broker.add_link("source", "sink").unwrap();

            for i in 0..100u8 {
                broker
                    .publish("source", Message::with_payload(vec![i]))
                    .unwrap();
            }
            while count.load(Ordering::SeqCst) < 100 {
                notify.notified().await;
            }

            broker.remove_module("sink").await.unwrap();
            black_box(count.load(Ordering::SeqCst));
        });
    });
}

fn wildcard_fan_out_to_ten(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("broker_wildcard_fan_out_to_ten", |b| {
        b.to_async(&rt).iter(|| async {
            let broker = Broker::create().unwrap();
            let count = Arc::new(AtomicUsize::new(0));
            let notify = Arc::new(Notify::new());
            for i in 0..10 {
                broker
                    .add_module(
                        format!("sink_{i}"),
                        Arc::new(CountingModule {
                            count: count.clone(),
                            notify: notify.clone(),
                        }) as Arc<dyn ModuleInstance>,
                    )
                    .unwrap();
                broker.add_link("source", &format!("sink_{i}")).unwrap();
            }

            broker
                .publish("source", Message::with_payload(vec![0xAA]))
                .unwrap();
            while count.load(Ordering::SeqCst) < 10 {
                notify.notified().await;
            }

            for i in 0..10 {
                broker.remove_module(&format!("sink_{i}")).await.unwrap();
            }
            black_box(count.load(Ordering::SeqCst));
        });
    });
}

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2))
        .without_plots()
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets =
        publish_deliver_roundtrip,
        sustained_single_link_throughput,
        wildcard_fan_out_to_ten,
}

criterion_main!(benches);
