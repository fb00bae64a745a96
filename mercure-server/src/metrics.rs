//! Hub metrics: OpenTelemetry instruments for subscriber counts, dispatch
//! volume, slow-consumer disconnects, auth failures and replay activity.
//! All metrics are prefixed with `mercure.hub.*`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mercure_server::HubMetrics;
//!
//! let metrics = HubMetrics::new("my-hub");
//! metrics.record_subscribe("http://example.com/books/1");
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

pub struct HubMetrics {
    pub subscribers_active: Gauge<i64>,
    pub subscriptions_total: Counter<u64>,
    pub updates_dispatched: Counter<u64>,
    pub slow_subscriber_disconnects: Counter<u64>,
    pub auth_failures: Counter<u64>,
    pub replayed_events: Counter<u64>,
}

impl HubMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            subscribers_active: meter
                .i64_gauge("mercure.hub.subscribers.active")
                .with_description("Number of currently connected subscribers")
                .build(),
            subscriptions_total: meter
                .u64_counter("mercure.hub.subscriptions.total")
                .with_description("Total subscriptions accepted since startup")
                .build(),
            updates_dispatched: meter
                .u64_counter("mercure.hub.updates.dispatched")
                .with_description("Total updates handed to a transport for dispatch")
                .build(),
            slow_subscriber_disconnects: meter
                .u64_counter("mercure.hub.subscribers.disconnected_slow")
                .with_description("Subscribers disconnected for a full inbox")
                .build(),
            auth_failures: meter
                .u64_counter("mercure.hub.auth.failures")
                .with_description("Authorization failures across subscribe and publish")
                .build(),
            replayed_events: meter
                .u64_counter("mercure.hub.replay.events")
                .with_description("Events delivered via Last-Event-ID replay")
                .build(),
        }
    }

    pub fn record_subscribe(&self, topic: &str) {
        let attributes = &[KeyValue::new("topic", topic.to_string())];
        self.subscriptions_total.add(1, attributes);
    }

    pub fn record_connection_count(&self, active: i64) {
        self.subscribers_active.record(active, &[]);
    }

    pub fn record_dispatch(&self, topic: &str) {
        let attributes = &[KeyValue::new("topic", topic.to_string())];
        self.updates_dispatched.add(1, attributes);
    }

    pub fn record_slow_disconnect(&self, subscriber_id: &str) {
        let attributes = &[KeyValue::new("subscriber_id", subscriber_id.to_string())];
        self.slow_subscriber_disconnects.add(1, attributes);
    }

    pub fn record_auth_failure(&self, role: &str) {
        let attributes = &[KeyValue::new("role", role.to_string())];
        self.auth_failures.add(1, attributes);
    }

    pub fn record_replay(&self, count: u64) {
        self.replayed_events.add(count, &[]);
    }
}
