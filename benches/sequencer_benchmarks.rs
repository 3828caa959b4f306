//! Async sequencer step-chain throughput benchmarks (spec.md §4.4):
//! - Zero-step immediate completion overhead
//! - A 10-step passthrough chain, end to end

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use iotedge_gateway_core::sequencer::{Sequencer, Step};
use serde_json::Value;
use tokio::sync::Notify;

fn immediate_start(value: Value) -> iotedge_gateway_core::sequencer::StartFn {
    Arc::new(move |_ctx, _prev| {
        let value = value.clone();
        Box::pin(async move { value })
    })
}

fn passthrough_finish() -> iotedge_gateway_core::sequencer::FinishFn {
    Arc::new(|_ctx, raw| Ok(raw))
}

fn zero_step_completion(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("sequencer_zero_step_completion", |b| {
        b.to_async(&rt).iter(|| async {
            let completed = Arc::new(Notify::new());
            let completed_clone = completed.clone();
            let seq = Sequencer::create(
                (),
                Box::new(|_ctx, _err| panic!("on_error must not fire")),
                Box::new(move |_ctx, _value| completed_clone.notify_one()),
            );
            seq.run().await.unwrap();
            completed.notified().await;
        });
    });
}

fn ten_step_passthrough_chain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("sequencer_ten_step_passthrough_chain", |b| {
        b.to_async(&rt).iter(|| async {
            let completed = Arc::new(Notify::new());
            let completed_clone = completed.clone();
            let seq = Sequencer::create(
                (),
                Box::new(|_ctx, _err| panic!("on_error must not fire")),
                Box::new(move |_ctx, _value| completed_clone.notify_one()),
            );
            seq.add_steps((0..10).map(|i| {
                Step::new(Value::Null, immediate_start(Value::from(i)), passthrough_finish())
            }))
            .unwrap();
            seq.run().await.unwrap();
            completed.notified().await;
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
        zero_step_completion,
        ten_step_passthrough_chain,
}

criterion_main!(benches);
