//! Downstream sinks fed by the dispatcher: persistence and alerting

pub mod alert;
pub mod snapshot;

pub use alert::{AlertSink, LogAlertSink, MemoryAlertSink, WebhookAlertSink};
pub use snapshot::{JsonlSnapshotStore, MemorySnapshotStore, SnapshotStore};
