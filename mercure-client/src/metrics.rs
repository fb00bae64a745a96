//! Client-side metrics: connection health and subscription throughput,
//! exported via OpenTelemetry the same way [`mercure_server::HubMetrics`]
//! exports the hub's side of the same connection.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mercure_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("my-client");
//! metrics.record_event();
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Client metrics for monitoring a subscription's connection lifecycle.
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)
    pub connection_state: Gauge<i64>,
    /// Total number of events received
    pub events_received: Counter<u64>,
    /// Total number of reconnection attempts
    pub reconnection_attempts: Counter<u64>,
    /// Total number of successful reconnections
    pub reconnection_success: Counter<u64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create a new `ClientMetrics` instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new `ClientMetrics` instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("mercure.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)")
                .build(),
            events_received: meter
                .u64_counter("mercure.client.events.received")
                .with_description("Total number of events received")
                .build(),
            reconnection_attempts: meter
                .u64_counter("mercure.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("mercure.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            errors_total: meter
                .u64_counter("mercure.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    /// Record an event received from the hub
    pub fn record_event(&self) {
        self.events_received.add(1, &[]);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}
