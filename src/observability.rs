use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed. Labels: kind (`single`/`group`).
pub const BOOKINGS_ACCEPTED_TOTAL: &str = "vermeil_bookings_accepted_total";

/// Counter: bookings rejected. Labels: kind, reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "vermeil_bookings_rejected_total";

/// Histogram: end-to-end booking latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "vermeil_booking_duration_seconds";

/// Counter: customer profiles created lazily by the identity resolver.
pub const CUSTOMERS_CREATED_TOTAL: &str = "vermeil_customers_created_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: items currently registered.
pub const ITEMS_REGISTERED: &str = "vermeil_items_registered";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "vermeil_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "vermeil_wal_flush_batch_size";

/// Install the fmt tracing subscriber. Call once from the hosting process.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install a Prometheus exporter on the given port. No-op if `port` is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
