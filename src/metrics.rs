//! Metrics sink - injected observer for engine counters.
//!
//! The engine never owns global counters; whoever boots it hands in a
//! sink. The deterministic core calls the order/match hooks only; the
//! latency hook exists for the runtime loop, which is the one place a
//! real clock is allowed.

/// Observer interface for engine activity. All methods default to
/// no-ops so sinks implement only what they track.
pub trait MetricsSink {
    /// A command was consumed (new order or cancel).
    fn on_order_processed(&mut self) {}

    /// A REJECTED report was emitted.
    fn on_order_rejected(&mut self) {}

    /// One fill occurred for `fill_qty` units.
    fn on_match_found(&mut self, fill_qty: u32) {
        let _ = fill_qty;
    }

    /// Wall-clock latency of one command, measured by the runtime loop
    /// outside the deterministic core.
    fn on_latency(&mut self, nanos: u64) {
        let _ = nanos;
    }
}

/// Sink that ignores everything; the default for engines that are not
/// being observed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl MetricsSink for NoOpMetrics {}

/// Simple counting sink for tests and basic monitoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountingMetrics {
    pub orders_processed: u64,
    pub orders_rejected: u64,
    pub matches_found: u64,
    pub quantity_matched: u64,
}

impl MetricsSink for CountingMetrics {
    fn on_order_processed(&mut self) {
        self.orders_processed += 1;
    }

    fn on_order_rejected(&mut self) {
        self.orders_rejected += 1;
    }

    fn on_match_found(&mut self, fill_qty: u32) {
        self.matches_found += 1;
        self.quantity_matched += fill_qty as u64;
    }
}
