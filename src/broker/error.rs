//! Broker error taxonomy (spec.md §7).

use thiserror::Error;

/// Errors the broker's own operations can return. Post-creation runtime
/// faults on a single subscriber (queue overflow, a `receive` panic) are
/// logged and contained by the worker, not surfaced here — they never take
/// down the gateway (spec.md §4.1).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// `add_module` was called with a name already attached.
    #[error("module `{name}` is already attached to the broker")]
    Duplicate { name: String },

    /// `remove_module`, `add_link`, or `remove_link` referenced a module or
    /// link that isn't present.
    #[error("`{name}` is not attached to the broker")]
    NotFound { name: String },

    /// A link that already exists was re-added, or a non-existent link was
    /// removed.
    #[error("link ({publisher} -> {subscriber}) {reason}")]
    InvalidLink {
        publisher: String,
        subscriber: String,
        reason: &'static str,
    },

    /// A precondition was violated: null handle, empty name, etc.
    #[error("invalid broker operation: {reason}")]
    Invalid { reason: String },

    /// Worker thread or queue allocation failed.
    #[error("resource exhausted while {context}")]
    ResourceExhausted { context: String },

    /// An internal broker invariant was violated.
    #[error("broker failure: {reason}")]
    BrokerFailure { reason: String },
}
