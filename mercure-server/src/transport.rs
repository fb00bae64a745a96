//! The pluggable transport abstraction: accepts dispatched updates, owns
//! the live subscriber registry, and optionally replays history.
//!
//! Two implementations ship with this crate: [`crate::local_transport::LocalTransport`]
//! (pure in-memory fan-out) and [`crate::bolt_transport::BoltTransport`]
//! (durable, sled-backed, supports [`Transport::dispatch_history`]).

use async_trait::async_trait;
use mercure_core::{Error, Result, Update};

use crate::subscriber::Subscriber;

/// Capability set every transport backend must implement. The handler only
/// ever talks to this trait, never to a concrete backend, so swapping
/// `LocalTransport` for `BoltTransport` requires no handler changes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast `update` to every currently registered subscriber whose
    /// selectors match it. Durable transports persist the update first.
    async fn dispatch(&self, update: Update) -> Result<()>;

    /// Register a new subscriber. Fails if the transport has capacity
    /// limits or has been closed.
    async fn add_subscriber(&self, subscriber: Subscriber) -> Result<()>;

    /// Deregister a subscriber. Idempotent: removing an unknown id is not
    /// an error.
    async fn remove_subscriber(&self, id: &str);

    /// Stop accepting subscribers and dispatches, and disconnect everyone
    /// currently registered. Idempotent.
    async fn close(&self);

    /// Replay every update persisted strictly after `since_event_id` to
    /// `subscriber`, filtered by the usual matching+authorization rules.
    /// The default implementation reports no history support, which is
    /// correct for [`crate::local_transport::LocalTransport`].
    async fn dispatch_history(&self, _subscriber: &Subscriber, _since_event_id: &str) -> Result<()> {
        Err(Error::TransportUnavailable)
    }

    /// Whether this transport backend can answer [`Transport::dispatch_history`].
    fn supports_history(&self) -> bool {
        false
    }
}
