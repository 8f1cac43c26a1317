// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Registrations created, by resulting status
// - Order composition outcomes and order status transitions
// - Events flipping to the waiting list
// - Access denials and rejected operations
// - Service operation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Registration Metrics
    pub registrations_total: IntCounterVec,
    pub registrations_cancelled: IntCounter,
    pub waiting_list_flips: IntCounter,

    // Order Metrics
    pub orders_composed: IntCounterVec,
    pub order_transitions: IntCounterVec,
    pub refund_orders_created: IntCounter,

    // Failure Metrics
    pub access_denied: IntCounterVec,
    pub operations_failed: IntCounterVec,

    // Latency
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Registration Metrics
        let registrations_total = IntCounterVec::new(
            Opts::new("registrations_total", "Registrations created, by initial status"),
            &["status"],
        )?;
        registry.register(Box::new(registrations_total.clone()))?;

        let registrations_cancelled = IntCounter::new(
            "registrations_cancelled_total",
            "Registrations cancelled",
        )?;
        registry.register(Box::new(registrations_cancelled.clone()))?;

        let waiting_list_flips = IntCounter::new(
            "event_waiting_list_flips_total",
            "Events moved to WaitingList after reaching capacity",
        )?;
        registry.register(Box::new(waiting_list_flips.clone()))?;

        // Order Metrics
        let orders_composed = IntCounterVec::new(
            Opts::new("orders_composed_total", "Order compositions, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_composed.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let refund_orders_created = IntCounter::new(
            "refund_orders_created_total",
            "Refund orders created from invoiced orders",
        )?;
        registry.register(Box::new(refund_orders_created.clone()))?;

        // Failure Metrics
        let access_denied = IntCounterVec::new(
            Opts::new("access_denied_total", "Operations rejected by the policy gate"),
            &["operation"],
        )?;
        registry.register(Box::new(access_denied.clone()))?;

        let operations_failed = IntCounterVec::new(
            Opts::new("operations_failed_total", "Failed service operations, by error kind"),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operations_failed.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("operation_duration_seconds", "Service operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            registrations_total,
            registrations_cancelled,
            waiting_list_flips,
            orders_composed,
            order_transitions,
            refund_orders_created,
            access_denied,
            operations_failed,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_registration(&self, status: &str) {
        self.registrations_total.with_label_values(&[status]).inc();
    }

    pub fn record_composition(&self, outcome: &str) {
        self.orders_composed.with_label_values(&[outcome]).inc();
    }

    pub fn record_order_transition(&self, from_status: &str, to_status: &str) {
        self.order_transitions
            .with_label_values(&[from_status, to_status])
            .inc();
    }

    pub fn record_access_denied(&self, operation: &str) {
        self.access_denied.with_label_values(&[operation]).inc();
    }

    /// Helper to record a finished service operation
    pub fn record_operation(&self, operation: &str, duration_secs: f64, failure_kind: Option<&str>) {
        if let Some(kind) = failure_kind {
            self.operations_failed.with_label_values(&[operation, kind]).inc();
        }
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}
