//! Core types shared by the hub's transports, matcher, authorizer and
//! HTTP layer.
//!
//! This crate provides the foundational pieces for implementing a
//! Mercure-style publish/subscribe hub:
//!
//! - **types**: wire-level `Event`, `Update`, and `Subscription` structures
//! - **topic_matcher**: exact/wildcard/URI-Template topic selector matching
//! - **authorizer**: JWT-based subscribe/publish authorization
//! - **error**: crate-wide error type and HTTP status mapping
//! - **observability**: OpenTelemetry integration for tracing, metrics and logs
//!
//! # Architecture
//!
//! The crate is transport-agnostic: matching and authorization decisions
//! are pure functions over selectors and topics, independent of how
//! updates actually reach subscribers. `mercure-server` builds the
//! in-memory and durable transports, the subscriber registry, and the
//! HTTP surface on top of this foundation.

pub mod authorizer;
pub mod error;
pub mod observability;
pub mod topic_matcher;
pub mod types;

pub use authorizer::{Authorization, Authorizer, Role};
pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use topic_matcher::{TopicMatcher, MATCH_ALL};
pub use types::{Event, Subscription, Update};
