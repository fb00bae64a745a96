//! Publish/subscribe hub: delivers topic updates to long-lived HTTP
//! subscribers over Server-Sent Events, with pluggable in-memory or
//! durable transports, URI-Template topic matching and JWT authorization.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mercure_server::HubBuilder;
//!
//! #[tokio::main]
//! async fn main() -> mercure_core::Result<()> {
//!     let addr: std::net::SocketAddr = "127.0.0.1:3000".parse().unwrap();
//!     let hub = HubBuilder::new()
//!         .bind(addr)
//!         .allow_anonymous(true)
//!         .build()
//!         .await?;
//!     hub.run().await
//! }
//! ```
//!
//! # Durable delivery
//!
//! ```rust,no_run
//! use mercure_server::HubBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> mercure_core::Result<()> {
//! let addr: std::net::SocketAddr = "127.0.0.1:3000".parse().unwrap();
//! let hub = HubBuilder::new()
//!     .bind(addr)
//!     .transport_url("./data/mercure.db")
//!     .retention_interval(Duration::from_secs(60))
//!     .dispatch_subscriptions(true)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod bolt_transport;
mod hub;
mod local_transport;
mod matching;
mod metrics;
mod publish_handler;
mod retention;
mod retention_task;
mod sse;
mod subscribe_handler;
mod subscriber;
mod subscription_events;
mod transport;

pub use bolt_transport::BoltTransport;
pub use hub::{HubBuilder, HubState, MercureHub};
pub use local_transport::LocalTransport;
pub use metrics::HubMetrics;
pub use retention::RetentionPolicy;
pub use subscriber::{Subscriber, SubscriberHandle, DEFAULT_INBOX_CAPACITY};
pub use subscription_events::{subscription_topic, SubscriptionEventSource};
pub use transport::Transport;
