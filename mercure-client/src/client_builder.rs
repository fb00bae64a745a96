//! Client builder for configuring reconnection and observability
//!
//! The `MercureClientBuilder` provides a fluent API for configuring client
//! behavior before subscribing. It allows you to:
//! - Set a bearer token sent with every connection attempt
//! - Enable automatic reconnection with various strategies
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use mercure_client::{MercureClientBuilder, ExponentialBackoff};
//!
//! # async fn example() -> mercure_core::Result<()> {
//! let client = MercureClientBuilder::new("http://localhost:3000/.well-known/mercure")
//!     .bearer_token("eyJhbGciOi...")
//!     .with_reconnect(Box::new(ExponentialBackoff::default()))
//!     .build()?;
//! let mut subscription = client.subscribe(vec!["/books/{id}".into()]).await?;
//! while let Some(event) = subscription.recv().await {
//!     println!("{}", event.data);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use mercure_core::{Error, ObservabilityConfig, Result};

use crate::client::MercureClient;
use crate::connection_state::ConnectionManager;
use crate::metrics::ClientMetrics;
use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};

/// Builder for configuring a [`MercureClient`]
pub struct MercureClientBuilder {
    hub_url: String,
    token: Option<String>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl MercureClientBuilder {
    /// Create a new client builder targeting the given hub subscribe URL
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            hub_url: hub_url.into(),
            token: None,
            reconnect_strategy: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Send this bearer token on every connection attempt
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Enable automatic reconnection with the given strategy
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Enable automatic reconnection with default exponential backoff
    pub fn with_default_reconnect(mut self) -> Self {
        self.reconnect_strategy = Some(Box::new(ExponentialBackoff::default()));
        self
    }

    /// Disable automatic reconnection (default)
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect_strategy = None;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client. Does not connect; call `subscribe` to open a
    /// connection.
    pub fn build(self) -> Result<MercureClient> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }
            mercure_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(e.to_string()))?;
            Some(Arc::new(ClientMetrics::new(&config.service_name)))
        } else {
            None
        };

        let connection_manager = self
            .reconnect_strategy
            .map(|strategy| Arc::new(ConnectionManager::new(self.hub_url.clone(), strategy)));

        Ok(MercureClient::from_parts(
            self.hub_url,
            self.token,
            connection_manager,
            metrics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::FixedDelay;
    use std::time::Duration;

    #[test]
    fn builder_defaults_have_no_reconnect_or_token() {
        let builder = MercureClientBuilder::new("http://localhost:3000/.well-known/mercure");
        assert!(builder.token.is_none());
        assert!(builder.reconnect_strategy.is_none());
        assert!(builder.observability_config.is_none());
    }

    #[test]
    fn bearer_token_is_stored() {
        let builder = MercureClientBuilder::new("http://localhost:3000/.well-known/mercure")
            .bearer_token("abc");
        assert_eq!(builder.token, Some("abc".to_string()));
    }

    #[test]
    fn with_reconnect_enables_a_strategy() {
        let strategy = Box::new(FixedDelay::new(Duration::from_secs(1)));
        let builder =
            MercureClientBuilder::new("http://localhost:3000/.well-known/mercure").with_reconnect(strategy);
        assert!(builder.reconnect_strategy.is_some());
    }

    #[test]
    fn without_reconnect_clears_a_previously_set_strategy() {
        let builder = MercureClientBuilder::new("http://localhost:3000/.well-known/mercure")
            .with_default_reconnect()
            .without_reconnect();
        assert!(builder.reconnect_strategy.is_none());
    }

    #[test]
    fn build_succeeds_without_observability() {
        let client =
            MercureClientBuilder::new("http://localhost:3000/.well-known/mercure").build();
        assert!(client.is_ok());
    }
}
