// Private module declaration
mod server;

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::domain::order::OrderStatus;
use crate::utils::CircuitState;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Order admission (created orders, ticket numbers, gate wait / rejections)
// - Status transitions by target and outcome
// - Customer directory lookups and its circuit breaker
//
// All metrics are registered with one Registry and scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Admission
    pub orders_created: IntCounterVec,
    pub order_creation_failures: IntCounterVec,
    pub tickets_issued: IntCounter,
    pub last_ticket_number: IntGauge,
    pub admission_wait: Histogram,
    pub admission_rejections: IntCounterVec,

    // Lifecycle
    pub status_transitions: IntCounterVec,

    // Customer directory
    pub customer_lookup_failures: IntCounter,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounterVec::new(
            Opts::new("orders_created_total", "Orders admitted, by initial status"),
            &["initial_status"],
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_creation_failures = IntCounterVec::new(
            Opts::new("order_creation_failures_total", "Order creations that failed after validation started"),
            &["reason"],
        )?;
        registry.register(Box::new(order_creation_failures.clone()))?;

        let tickets_issued = IntCounter::new("tickets_issued_total", "Ticket numbers allocated")?;
        registry.register(Box::new(tickets_issued.clone()))?;

        let last_ticket_number = IntGauge::new("last_ticket_number", "Most recently issued ticket number")?;
        registry.register(Box::new(last_ticket_number.clone()))?;

        let admission_wait = Histogram::with_opts(
            HistogramOpts::new("admission_wait_seconds", "Time spent waiting for the admission gate")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(admission_wait.clone()))?;

        let admission_rejections = IntCounterVec::new(
            Opts::new("admission_rejections_total", "Creations that never acquired the admission gate"),
            &["reason"],
        )?;
        registry.register(Box::new(admission_rejections.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Status transition attempts"),
            &["target", "outcome"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let customer_lookup_failures = IntCounter::new(
            "customer_lookup_failures_total",
            "Customer directory lookups that left an order without a name",
        )?;
        registry.register(Box::new(customer_lookup_failures.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "customer_directory_circuit_state",
            "Customer directory circuit breaker state (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_creation_failures,
            tickets_issued,
            last_ticket_number,
            admission_wait,
            admission_rejections,
            status_transitions,
            customer_lookup_failures,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, status: OrderStatus) {
        self.orders_created.with_label_values(&[status.as_str()]).inc();
    }

    pub fn record_creation_failure(&self, reason: &str) {
        self.order_creation_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_ticket(&self, number: i32) {
        self.tickets_issued.inc();
        self.last_ticket_number.set(i64::from(number));
    }

    pub fn observe_admission_wait(&self, waited: Duration) {
        self.admission_wait.observe(waited.as_secs_f64());
    }

    pub fn record_admission_rejected(&self, reason: &str) {
        self.admission_rejections.with_label_values(&[reason]).inc();
    }

    pub fn record_transition(&self, target: OrderStatus, outcome: &str) {
        self.status_transitions
            .with_label_values(&[target.as_str(), outcome])
            .inc();
    }

    pub fn record_customer_lookup_failure(&self) {
        self.customer_lookup_failures.inc();
    }

    pub fn update_circuit_breaker_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.as_gauge());
    }
}
