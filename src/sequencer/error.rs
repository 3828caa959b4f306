//! Errors surfaced by the async sequencer (spec.md §4.4, §7's `AsyncFailure`).

use thiserror::Error;

/// Failure modes for [`crate::sequencer::Sequencer`] construction and
/// driving. The error a step's finish callback produces is boxed and
/// carried unchanged through to `on_error` — the sequencer itself never
/// interprets it.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// `add_steps` was called after `run` had already transitioned the
    /// sequencer out of `Pending`.
    #[error("cannot add steps once the sequencer has left the Pending state")]
    NotPending,

    /// `run` was called more than once.
    #[error("sequencer has already run")]
    AlreadyRun,

    /// A step's finish callback produced an error; short-circuits the
    /// remaining steps and fires `on_error` (spec.md §4.4 `resolve`).
    #[error("step {index} failed: {source}")]
    StepFailed {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
