use std::net::SocketAddr;

use crate::engine::{Placement, Rejection};

// ── Scheduling ──────────────────────────────────────────────────

/// Counter: placement validations. Labels: outcome.
pub const PLACEMENTS_TOTAL: &str = "salonboard_placements_total";

/// Histogram: time spent in one placement validation, in seconds.
pub const VALIDATION_DURATION_SECONDS: &str = "salonboard_validation_duration_seconds";

/// Histogram: appointments in a loaded day snapshot.
pub const DAY_SNAPSHOT_SIZE: &str = "salonboard_day_snapshot_size";

// ── Board / store ───────────────────────────────────────────────

/// Counter: record-store writes issued by the board. Labels: op.
pub const STORE_WRITES_TOTAL: &str = "salonboard_store_writes_total";

/// Counter: undo tokens dropped after their window closed.
pub const UNDO_PURGED_TOTAL: &str = "salonboard_undo_purged_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "salonboard_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "salonboard_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a placement outcome.
pub fn placement_label(placement: &Placement) -> &'static str {
    match placement {
        Placement::Accepted(_) => "accepted",
        Placement::Rejected(Rejection::OutOfWindow { .. }) => "out_of_window",
        Placement::Rejected(Rejection::Overlap { .. }) => "overlap",
    }
}
