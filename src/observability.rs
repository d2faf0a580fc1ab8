use std::net::SocketAddr;

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total protocol requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "rentd_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "rentd_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: reserve attempts. Labels: outcome (`confirmed` or the error kind).
pub const RESERVATIONS_TOTAL: &str = "rentd_reservations_total";

/// Counter: cancel attempts. Labels: outcome (`cancelled` or the error kind).
pub const CANCELLATIONS_TOTAL: &str = "rentd_cancellations_total";

/// Counter: transactions dropped without committing.
pub const TRANSACTION_ROLLBACKS_TOTAL: &str = "rentd_transaction_rollbacks_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "rentd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "rentd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "rentd_connections_rejected_total";

/// Counter: failed auth handshakes.
pub const AUTH_FAILURES_TOTAL: &str = "rentd_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "rentd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (commits per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "rentd_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a request to a short label for metrics.
pub fn request_label(req: &Request) -> &'static str {
    match req {
        Request::Auth { .. } => "auth",
        Request::AddItem { .. } => "add_item",
        Request::SetMaintenance { .. } => "set_maintenance",
        Request::GetItem { .. } => "get_item",
        Request::Quote { .. } => "quote",
        Request::Reserve { .. } => "reserve",
        Request::Cancel { .. } => "cancel",
        Request::GetReservation { .. } => "get_reservation",
        Request::ListReservations { .. } => "list_reservations",
        Request::LatestReservation { .. } => "latest_reservation",
        Request::GetPayment { .. } => "get_payment",
    }
}
