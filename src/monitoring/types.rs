//! Monitoring event types and configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::traits::{EventSeverity, MonitoringEvent};

/// Configuration for monitoring behavior.
///
/// Controls how events are recorded, filtered, and stored in the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringConfig {
    /// Whether monitoring is enabled
    pub enabled: bool,

    /// Maximum number of events to keep in history
    pub max_history_size: usize,

    /// Minimum severity level to record (events below this are filtered)
    pub severity_filter: EventSeverity,

    /// Interval for snapshot generation (if using background snapshots)
    #[serde(with = "humantime_serde_shim")]
    pub snapshot_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_size: 1000,
            severity_filter: EventSeverity::Info,
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

/// Minimal serde shim for `Duration` (seconds as u64), avoiding an extra
/// dependency for a single field.
mod humantime_serde_shim {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Snapshot of monitoring state at a point in time.
///
/// Provides queryable access to monitoring counters and recent event history.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSnapshot<E: MonitoringEvent> {
    /// Timestamp when snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Total number of events recorded
    pub total_events: u64,

    /// Number of trace-level events
    pub trace_count: u64,

    /// Number of debug-level events
    pub debug_count: u64,

    /// Number of info-level events
    pub info_count: u64,

    /// Number of warning-level events
    pub warning_count: u64,

    /// Number of error-level events
    pub error_count: u64,

    /// Number of critical-level events
    pub critical_count: u64,

    /// Recent events (up to max_history_size)
    pub recent_events: Vec<E>,
}

// ============================================================================
// Gateway lifecycle events (spec.md §6 — the closed event enum)
// ============================================================================

/// Events the gateway emits to its subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayEvent {
    pub timestamp: DateTime<Utc>,
    pub event_kind: GatewayEventKind,
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for GatewayEvent {
    const EVENT_TYPE: &'static str = "gateway";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            GatewayEventKind::Created => EventSeverity::Info,
            GatewayEventKind::Destroyed => EventSeverity::Info,
            GatewayEventKind::ModuleListChanged => EventSeverity::Debug,
        }
    }
}

/// The exact closed enum spec.md §6 describes: `Created`, `Destroyed`,
/// `ModuleListChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum GatewayEventKind {
    Created,
    Destroyed,
    ModuleListChanged,
}

// ============================================================================
// Module events
// ============================================================================

/// Events related to a single module's lifecycle within the broker/gateway.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleEvent {
    pub timestamp: DateTime<Utc>,
    pub module_name: String,
    pub event_kind: ModuleEventKind,
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for ModuleEvent {
    const EVENT_TYPE: &'static str = "module";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ModuleEventKind::Attached => EventSeverity::Info,
            ModuleEventKind::Started => EventSeverity::Info,
            ModuleEventKind::Draining => EventSeverity::Debug,
            ModuleEventKind::Detached => EventSeverity::Info,
            ModuleEventKind::ReceiveFaulted { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of module events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ModuleEventKind {
    /// Module registered with the broker and its worker started.
    Attached,
    /// `start()` was invoked on the module.
    Started,
    /// Exit sentinel posted; worker draining remaining queue entries.
    Draining,
    /// Worker joined and the module's queue freed.
    Detached,
    /// The module's `receive` callback faulted; the worker contained it and
    /// continued.
    ReceiveFaulted { error: String },
}

// ============================================================================
// Broker events
// ============================================================================

/// Events related to link-table mutation and message dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerEvent {
    pub timestamp: DateTime<Utc>,
    pub event_kind: BrokerEventKind,
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for BrokerEvent {
    const EVENT_TYPE: &'static str = "broker";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            BrokerEventKind::LinkAdded { .. } => EventSeverity::Debug,
            BrokerEventKind::LinkRemoved { .. } => EventSeverity::Debug,
            BrokerEventKind::Published { .. } => EventSeverity::Trace,
            BrokerEventKind::Dispatched { .. } => EventSeverity::Trace,
            BrokerEventKind::DispatchDropped { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific types of broker events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BrokerEventKind {
    /// A `(publisher, subscriber)` edge was added to the link table.
    LinkAdded { publisher: String, subscriber: String },
    /// A `(publisher, subscriber)` edge was removed.
    LinkRemoved { publisher: String, subscriber: String },
    /// `publish` matched at least one subscriber and enqueued to it.
    Published { publisher: String, subscriber_count: usize },
    /// A message was handed off to a subscriber's queue.
    Dispatched { publisher: String, subscriber: String },
    /// A subscriber's queue was full; the message was dropped for that
    /// subscriber only (spec.md §4.1 backpressure).
    DispatchDropped { publisher: String, subscriber: String },
}

// ============================================================================
// Mailbox (per-module queue) events
// ============================================================================

/// Events related to a single module's inbound queue.
#[derive(Debug, Clone, Serialize)]
pub struct MailboxEvent {
    pub timestamp: DateTime<Utc>,
    pub module_name: String,
    pub event_kind: MailboxEventKind,
}

impl MonitoringEvent for MailboxEvent {
    const EVENT_TYPE: &'static str = "mailbox";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            MailboxEventKind::Enqueued => EventSeverity::Trace,
            MailboxEventKind::Delivered => EventSeverity::Trace,
            MailboxEventKind::Dropped => EventSeverity::Warning,
        }
    }
}

/// Specific types of mailbox events.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type")]
pub enum MailboxEventKind {
    Enqueued,
    Delivered,
    Dropped,
}

// ============================================================================
// Async sequencer events
// ============================================================================

/// Events related to an async sequencer's step progression.
#[derive(Debug, Clone, Serialize)]
pub struct SequencerEvent {
    pub timestamp: DateTime<Utc>,
    pub event_kind: SequencerEventKind,
}

impl MonitoringEvent for SequencerEvent {
    const EVENT_TYPE: &'static str = "sequencer";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            SequencerEventKind::StepStarted { .. } => EventSeverity::Trace,
            SequencerEventKind::StepFinished { .. } => EventSeverity::Trace,
            SequencerEventKind::Completed => EventSeverity::Info,
            SequencerEventKind::Errored { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of async sequencer events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SequencerEventKind {
    StepStarted { index: usize },
    StepFinished { index: usize },
    Completed,
    Errored { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitoring_config_default() {
        let config = MonitoringConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_history_size, 1000);
        assert_eq!(config.severity_filter, EventSeverity::Info);
        assert_eq!(config.snapshot_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_gateway_event_severity() {
        let event = GatewayEvent {
            timestamp: Utc::now(),
            event_kind: GatewayEventKind::ModuleListChanged,
            metadata: HashMap::new(),
        };
        assert_eq!(event.severity(), EventSeverity::Debug);
        assert_eq!(GatewayEvent::EVENT_TYPE, "gateway");
    }

    #[test]
    fn test_module_event_fault_severity() {
        let event = ModuleEvent {
            timestamp: Utc::now(),
            module_name: "a".to_string(),
            event_kind: ModuleEventKind::ReceiveFaulted {
                error: "boom".to_string(),
            },
            metadata: HashMap::new(),
        };
        assert_eq!(event.severity(), EventSeverity::Error);
    }

    #[test]
    fn test_broker_event_dispatch_dropped_severity() {
        let event = BrokerEvent {
            timestamp: Utc::now(),
            event_kind: BrokerEventKind::DispatchDropped {
                publisher: "a".to_string(),
                subscriber: "b".to_string(),
            },
            metadata: HashMap::new(),
        };
        assert_eq!(event.severity(), EventSeverity::Warning);
        assert_eq!(BrokerEvent::EVENT_TYPE, "broker");
    }

    #[test]
    fn test_mailbox_event_dropped_severity() {
        let event = MailboxEvent {
            timestamp: Utc::now(),
            module_name: "a".to_string(),
            event_kind: MailboxEventKind::Dropped,
        };
        assert_eq!(event.severity(), EventSeverity::Warning);
        assert_eq!(MailboxEvent::EVENT_TYPE, "mailbox");
    }

    #[test]
    fn test_sequencer_event_error_severity() {
        let event = SequencerEvent {
            timestamp: Utc::now(),
            event_kind: SequencerEventKind::Errored {
                reason: "step 2 failed".to_string(),
            },
        };
        assert_eq!(event.severity(), EventSeverity::Error);
        assert_eq!(SequencerEvent::EVENT_TYPE, "sequencer");
    }

    #[test]
    fn test_monitoring_snapshot_creation() {
        let snapshot = MonitoringSnapshot::<GatewayEvent> {
            timestamp: Utc::now(),
            total_events: 100,
            trace_count: 10,
            debug_count: 20,
            info_count: 30,
            warning_count: 25,
            error_count: 10,
            critical_count: 5,
            recent_events: vec![],
        };

        assert_eq!(snapshot.total_events, 100);
        assert_eq!(snapshot.critical_count, 5);
    }
}
