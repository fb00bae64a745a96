//! Client for subscribing to a Mercure-protocol hub's Server-Sent Events
//! stream, with optional reconnect-with-backoff and `Last-Event-ID` resume.
//!
//! # Core Features
//!
//! - **SSE transport**: subscribes to a hub's `/.well-known/mercure` (or
//!   custom) endpoint and decodes the framed events it streams back
//! - **Topic selectors**: subscribe to one or more topics per connection,
//!   matched by the hub using the same URI-Template/wildcard rules as any
//!   other subscriber
//! - **Auto-reconnection**: pluggable reconnection strategy with
//!   exponential backoff, resuming from the last seen event id
//! - **Observability**: OpenTelemetry integration for connection-state and
//!   throughput metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mercure_client::MercureClient;
//!
//! #[tokio::main]
//! async fn main() -> mercure_core::Result<()> {
//!     let client = MercureClient::new("http://localhost:3000/.well-known/mercure");
//!     let mut subscription = client.subscribe(vec!["/books/{id}".into()]).await?;
//!     while let Some(event) = subscription.recv().await {
//!         println!("{}", event.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection
//!
//! ```rust,no_run
//! use mercure_client::{MercureClientBuilder, ExponentialBackoff};
//!
//! # async fn example() -> mercure_core::Result<()> {
//! let client = MercureClientBuilder::new("http://localhost:3000/.well-known/mercure")
//!     .bearer_token("eyJhbGciOi...")
//!     .with_reconnect(Box::new(
//!         ExponentialBackoff::default(),
//!     ))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod metrics;
mod reconnect;

pub use client::{MercureClient, Subscription, DEFAULT_SUBSCRIPTION_CAPACITY};
pub use client_builder::MercureClientBuilder;
pub use connection_state::{ConnectionManager, ConnectionState};
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
