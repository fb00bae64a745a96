//! Mercure - a pub/sub hub for Server-Sent Events
//!
//! This is the convenience crate that re-exports the `mercure-*` sub-crates.
//! Use this crate if you want a single dependency that provides both hub
//! and client functionality.
//!
//! # Architecture
//!
//! Mercure is organized into modular crates:
//!
//! - **mercure-core**: Shared types, topic matching, JWT authorization, observability
//! - **mercure-server**: The hub itself (SSE delivery, transports, retention)
//! - **mercure-client**: An SSE-subscribing client with reconnection
//!
//! # Quick Start - Hub
//!
//! ```rust,no_run
//! use mercure_hub::HubBuilder;
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
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use mercure_hub::MercureClient;
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

// Re-export all public APIs from sub-crates under a `mercure::` prefix.
pub use mercure_client as client;
pub use mercure_core as core;
pub use mercure_server as server;

// Convenience re-exports of the most commonly used types, avoiding the need
// to write out `mercure::server::HubBuilder`.
pub use mercure_client::MercureClient;
pub use mercure_server::{HubBuilder, MercureHub};
