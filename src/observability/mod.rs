//! Observability for mission runs.
//!
//! Console logging through `tracing`, an optional JSONL event stream, and
//! Prometheus metrics.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
