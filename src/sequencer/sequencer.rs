//! The cooperative async sequencer (spec.md §4.4): runs a pre-built list of
//! steps in order, each step's *start* initiating a platform async
//! operation and its *finish* extracting a value or error from the
//! completed operation, short-circuiting to an error callback on failure.
//!
//! The reference implementation (`gio_async_seq.c` in the retrieved
//! original source) targets a callback-driven platform async API (GLib's
//! `GAsyncReadyCallback`): `start` kicks off the operation and returns
//! immediately, and `resolve` is invoked later, out-of-band, when the
//! platform signals completion. On a native-async runtime the same split
//! still holds — `start` returns a future standing in for "the operation is
//! in flight"; `resolve` is simply where this sequencer drives that future
//! to completion and decides what happens next. spec.md §9 notes this
//! collapses to a linear `.await` chain in spirit; this type preserves the
//! explicit *step list + short-circuit* contract so it stays a reusable
//! engine other modules can hand step lists to, exactly as spec.md
//! describes several core modules doing.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use crate::sequencer::error::SequencerError;

/// `Pending → Running → (Complete | Error)` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Pending,
    Running,
    Complete,
    Error,
}

/// A step's *start* callback: given the per-step context and the value
/// produced by the previous step's `finish` (or `Value::Null` for step 0),
/// initiates the platform async operation and returns a future standing in
/// for its completion.
pub type StartFn =
    Arc<dyn Fn(Value, Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// A step's *finish* callback: extracts a value or error from the
/// completed operation's raw result.
pub type FinishFn = Arc<
    dyn Fn(Value, Value) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

/// One step: a per-step context plus its start/finish pair.
#[derive(Clone)]
pub struct Step {
    context: Value,
    start: StartFn,
    finish: FinishFn,
}

impl Step {
    /// Builds a step from a per-step context and a `(start, finish)` pair.
    pub fn new(context: Value, start: StartFn, finish: FinishFn) -> Self {
        Self {
            context,
            start,
            finish,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("context", &self.context).finish_non_exhaustive()
    }
}

/// Invoked exactly once, with the sequence's user context and the error
/// that short-circuited it, when any step's finish fails.
pub type OnError<C> = Box<dyn Fn(Arc<C>, SequencerError) + Send + Sync>;

/// Invoked exactly once, with the sequence's user context and the final
/// step's output (or `Value::Null` if there were zero steps), when every
/// step completes successfully.
pub type OnComplete<C> = Box<dyn Fn(Arc<C>, Value) + Send + Sync>;

struct Inner<C> {
    user_context: Arc<C>,
    steps: RwLock<Vec<Step>>,
    state: RwLock<SequencerState>,
    current: AtomicUsize,
    on_error: OnError<C>,
    on_complete: OnComplete<C>,
}

/// A single-use, cooperatively-driven chain of async steps over a shared
/// user context `C` (spec.md §4.4).
///
/// `Sequencer` is cheap to clone — it is an `Arc`-backed handle, matching
/// every other shared-ownership type in this crate.
pub struct Sequencer<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Sequencer<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + Sync + 'static> Sequencer<C> {
    /// Constructs an empty, `Pending` sequence over `user_context`.
    pub fn create(user_context: C, on_error: OnError<C>, on_complete: OnComplete<C>) -> Self {
        Self {
            inner: Arc::new(Inner {
                user_context: Arc::new(user_context),
                steps: RwLock::new(Vec::new()),
                state: RwLock::new(SequencerState::Pending),
                current: AtomicUsize::new(0),
                on_error,
                on_complete,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> SequencerState {
        *self.inner.state.read()
    }

    /// Appends steps. Must be called while `Pending`.
    pub fn add_steps(&self, steps: impl IntoIterator<Item = Step>) -> Result<(), SequencerError> {
        if self.state() != SequencerState::Pending {
            return Err(SequencerError::NotPending);
        }
        self.inner.steps.write().extend(steps);
        Ok(())
    }

    /// Transitions to `Running` and invokes step 0's start with a null
    /// previous result. With zero steps, transitions straight to `Complete`
    /// and invokes `on_complete` with a null result (spec.md §4.4 `run`).
    pub async fn run(&self) -> Result<(), SequencerError> {
        {
            let mut state = self.inner.state.write();
            if *state != SequencerState::Pending {
                return Err(SequencerError::AlreadyRun);
            }
            *state = SequencerState::Running;
        }

        let step_count = self.inner.steps.read().len();
        if step_count == 0 {
            *self.inner.state.write() = SequencerState::Complete;
            (self.inner.on_complete)(Arc::clone(&self.inner.user_context), Value::Null);
            return Ok(());
        }

        self.drive_step(0, Value::Null).await;
        Ok(())
    }

    /// Starts step `index` with `previous` as its input, then immediately
    /// awaits its completion and resolves it. This is what `run` and every
    /// subsequent advance call; on a callback-driven platform API, the
    /// "await its completion" half is where [`Sequencer::resolve`] would
    /// instead be invoked later, out-of-band.
    async fn drive_step(&self, index: usize, previous: Value) {
        let step = {
            let steps = self.inner.steps.read();
            steps[index].clone()
        };
        debug!(step = index, "async sequencer step starting");
        let raw_result = (step.start)(step.context.clone(), previous).await;
        self.resolve_step(index, step, raw_result);
    }

    /// Invoked when a step's in-flight platform operation completes
    /// (spec.md §4.4 `resolve`). Looks up the current step's finish
    /// callback, invokes it, and either short-circuits to `on_error` or
    /// advances to the next step / `on_complete`.
    ///
    /// Exposed for callers whose steps hand off to genuinely callback-driven
    /// platform APIs rather than an awaitable future — such a step's
    /// `start` can stash `raw_result` for delivery via an external callback
    /// that then calls `resolve` directly instead of relying on
    /// [`Sequencer::drive_step`]'s await.
    pub fn resolve(&self, raw_result: Value) {
        let index = self.inner.current.load(Ordering::Acquire);
        let step = {
            let steps = self.inner.steps.read();
            steps[index].clone()
        };
        self.resolve_step(index, step, raw_result);
    }

    fn resolve_step(&self, index: usize, step: Step, raw_result: Value) {
        match (step.finish)(step.context, raw_result) {
            Ok(value) => {
                debug!(step = index, "async sequencer step finished");
                let next_index = index + 1;
                let step_count = self.inner.steps.read().len();
                if next_index < step_count {
                    self.inner.current.store(next_index, Ordering::Release);
                    let this = self.clone();
                    tokio::spawn(async move {
                        this.drive_step(next_index, value).await;
                    });
                } else {
                    *self.inner.state.write() = SequencerState::Complete;
                    (self.inner.on_complete)(Arc::clone(&self.inner.user_context), value);
                }
            }
            Err(source) => {
                error!(step = index, error = %source, "async sequencer step failed");
                *self.inner.state.write() = SequencerState::Error;
                (self.inner.on_error)(
                    Arc::clone(&self.inner.user_context),
                    SequencerError::StepFailed { index, source },
                );
            }
        }
    }

    /// Releases the step list. Does not cancel in-flight platform
    /// operations — callers must ensure none is in flight, or accept a late
    /// [`Sequencer::resolve`] call against a sequence whose steps have
    /// already been cleared (spec.md §4.4 `destroy`).
    pub fn destroy(&self) {
        self.inner.steps.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize as StdAtomicUsize};

    use tokio::sync::Notify;

    use super::*;

    fn immediate_start(value: Value) -> StartFn {
        Arc::new(move |_ctx, _prev| {
            let value = value.clone();
            Box::pin(async move { value })
        })
    }

    fn passthrough_finish() -> FinishFn {
        Arc::new(|_ctx, raw| Ok(raw))
    }

    fn failing_finish() -> FinishFn {
        Arc::new(|_ctx, _raw| Err("boom".into()))
    }

    #[tokio::test]
    async fn zero_steps_completes_immediately() {
        let completed = Arc::new(Notify::new());
        let completed_clone = completed.clone();
        let seq = Sequencer::create(
            (),
            Box::new(|_ctx, _err| panic!("on_error must not fire")),
            Box::new(move |_ctx, value| {
                assert_eq!(value, Value::Null);
                completed_clone.notify_one();
            }),
        );
        seq.run().await.expect("run succeeds");
        completed.notified().await;
        assert_eq!(seq.state(), SequencerState::Complete);
    }

    #[tokio::test]
    async fn three_step_chain_passes_values_forward() {
        let completed = Arc::new(Notify::new());
        let completed_clone = completed.clone();
        let seq = Sequencer::create(
            (),
            Box::new(|_ctx, _err| panic!("on_error must not fire")),
            Box::new(move |_ctx, value| {
                assert_eq!(value, Value::from(3));
                completed_clone.notify_one();
            }),
        );
        seq.add_steps([
            Step::new(Value::Null, immediate_start(Value::from(1)), passthrough_finish()),
            Step::new(Value::Null, immediate_start(Value::from(2)), passthrough_finish()),
            Step::new(Value::Null, immediate_start(Value::from(3)), passthrough_finish()),
        ])
        .expect("add_steps succeeds while pending");

        seq.run().await.expect("run succeeds");
        completed.notified().await;
        assert_eq!(seq.state(), SequencerState::Complete);
    }

    #[tokio::test]
    async fn step_two_failure_short_circuits_step_three() {
        let errored = Arc::new(Notify::new());
        let errored_clone = errored.clone();
        let step_three_ran = Arc::new(AtomicBool::new(false));
        let step_three_ran_clone = step_three_ran.clone();
        let error_count = Arc::new(StdAtomicUsize::new(0));
        let error_count_clone = error_count.clone();

        let seq = Sequencer::create(
            (),
            Box::new(move |_ctx, err| {
                error_count_clone.fetch_add(1, Ordering::SeqCst);
                assert!(matches!(err, SequencerError::StepFailed { index: 1, .. }));
                errored_clone.notify_one();
            }),
            Box::new(|_ctx, _value| panic!("on_complete must not fire")),
        );

        let step_three_start: StartFn = Arc::new(move |_ctx, prev| {
            step_three_ran_clone.store(true, Ordering::SeqCst);
            Box::pin(async move { prev })
        });

        seq.add_steps([
            Step::new(Value::Null, immediate_start(Value::from(1)), passthrough_finish()),
            Step::new(Value::Null, immediate_start(Value::Null), failing_finish()),
            Step::new(Value::Null, step_three_start, passthrough_finish()),
        ])
        .expect("add_steps succeeds while pending");

        seq.run().await.expect("run succeeds");
        errored.notified().await;

        assert_eq!(seq.state(), SequencerState::Error);
        assert_eq!(error_count.load(Ordering::SeqCst), 1);
        assert!(!step_three_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn add_steps_after_run_is_rejected() {
        let seq = Sequencer::create(
            (),
            Box::new(|_ctx, _err| {}),
            Box::new(|_ctx, _value| {}),
        );
        seq.run().await.expect("run succeeds with zero steps");
        let err = seq
            .add_steps([Step::new(Value::Null, immediate_start(Value::Null), passthrough_finish())])
            .unwrap_err();
        assert!(matches!(err, SequencerError::NotPending));
    }

    #[tokio::test]
    async fn run_twice_is_rejected() {
        let seq = Sequencer::create((), Box::new(|_ctx, _err| {}), Box::new(|_ctx, _value| {}));
        seq.run().await.expect("first run succeeds");
        let err = seq.run().await.unwrap_err();
        assert!(matches!(err, SequencerError::AlreadyRun));
    }
}
