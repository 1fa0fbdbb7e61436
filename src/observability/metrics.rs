//! Prometheus metrics for mission runs.
//!
//! Every label value comes from a closed set (phase names, message kind
//! labels, outcome strings), so remote input can never grow cardinality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::FleetError;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `FleetError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), FleetError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| FleetError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "fleetctl_messages_sent_total",
        "Frames written to participants, by message kind"
    );
    describe_counter!(
        "fleetctl_messages_received_total",
        "Messages decoded from participants, by message kind"
    );
    describe_counter!(
        "fleetctl_phase_outcomes_total",
        "Phase barrier outcomes, by phase and outcome"
    );
    describe_counter!(
        "fleetctl_participant_failures_total",
        "Participants failed, by phase"
    );
    describe_histogram!(
        "fleetctl_phase_duration_ms",
        "Phase barrier duration in milliseconds"
    );
    describe_gauge!(
        "fleetctl_participants_connected",
        "Participants currently connected and active"
    );
}

/// Records a frame written to a participant.
pub fn record_message_sent(kind: &'static str) {
    counter!("fleetctl_messages_sent_total", "kind" => kind).increment(1);
}

/// Records a message decoded from a participant.
pub fn record_message_received(kind: &'static str) {
    counter!("fleetctl_messages_received_total", "kind" => kind).increment(1);
}

/// Records the outcome and duration of one phase.
pub fn record_phase_outcome(phase: &'static str, outcome: &'static str, duration: Duration) {
    counter!("fleetctl_phase_outcomes_total", "phase" => phase, "outcome" => outcome).increment(1);
    histogram!("fleetctl_phase_duration_ms", "phase" => phase)
        .record(duration.as_secs_f64() * 1000.0);
}

/// Records one participant failure.
pub fn record_participant_failure(phase: &'static str) {
    counter!("fleetctl_participant_failures_total", "phase" => phase).increment(1);
}

/// Sets the number of connected, active participants.
#[allow(clippy::cast_precision_loss)]
pub fn set_participants_connected(count: usize) {
    gauge!("fleetctl_participants_connected").set(count as f64);
}
