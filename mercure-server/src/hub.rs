//! Fluent construction of a runnable hub: a builder over bind address,
//! transport selection, JWT keys, retention and observability, whose
//! `build()` wires the axum router and binds the listener.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mercure_server::HubBuilder;
//!
//! # async fn example() -> mercure_core::Result<()> {
//! let addr: std::net::SocketAddr = "127.0.0.1:3000".parse().unwrap();
//! let hub = HubBuilder::new()
//!     .bind(addr)
//!     .allow_anonymous(true)
//!     .build()
//!     .await?;
//! hub.run().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router as AxumRouter;
use jsonwebtoken::DecodingKey;
use mercure_core::{Authorizer, Error, ObservabilityConfig, Result, TopicMatcher};
use tokio::net::TcpListener;

use crate::bolt_transport::BoltTransport;
use crate::local_transport::LocalTransport;
use crate::metrics::HubMetrics;
use crate::retention::RetentionPolicy;
use crate::retention_task;
use crate::subscribe_handler::subscribe;
use crate::publish_handler::publish;
use crate::subscriber::DEFAULT_INBOX_CAPACITY;
use crate::subscription_events::SubscriptionEventSource;
use crate::transport::Transport;

/// Which transport backend to build. Selected via `HubBuilder::transport_url`,
/// mirroring the configuration-key table's `transport_url` entry.
#[derive(Debug, Clone)]
enum TransportKind {
    Local,
    Bolt(PathBuf),
}

/// Shared state handed to every axum handler.
pub struct HubState {
    pub transport: Arc<dyn Transport>,
    pub matcher: Arc<TopicMatcher>,
    pub subscriber_authorizer: Authorizer,
    pub publisher_authorizer: Authorizer,
    pub heartbeat_interval: Duration,
    pub dispatch_subscriptions: bool,
    pub debug: bool,
    pub subscriber_queue_capacity: usize,
    pub metrics: Option<Arc<HubMetrics>>,
    pub subscription_events: SubscriptionEventSource,
}

/// A built, runnable hub: an axum router bound to a listener plus the
/// shared transport/authorization state the handlers close over.
pub struct MercureHub {
    listener: Option<TcpListener>,
    router: Option<AxumRouter>,
    state: Arc<HubState>,
    retention_shutdown_tx: Option<tokio::sync::watch::Sender<bool>>,
}

impl MercureHub {
    /// Entry point for configuring a hub.
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Run the hub, accepting connections until the process is terminated.
    #[tracing::instrument(skip(self), name = "hub.run")]
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("mercure hub listening");
        let listener = self.listener.take().expect("listener present for the lifetime of the hub");
        let router = self.router.take().expect("router present for the lifetime of the hub");
        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Io(e.to_string()))
    }

    /// The shared transport, for publishing from within the same process.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.state.transport.clone()
    }

    /// The local address the hub is bound to. Useful with port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener
            .as_ref()
            .expect("listener present for the lifetime of the hub")
            .local_addr()
    }
}

impl Drop for MercureHub {
    fn drop(&mut self) {
        if let Some(tx) = &self.retention_shutdown_tx {
            let _ = tx.send(true);
        }
    }
}

/// Fluent hub configuration, following the configuration-key table: bind
/// address, `heartbeat_interval`, `dispatch_subscriptions`, `debug`,
/// `publisher_jwt_key`/`subscriber_jwt_key`, `allow_anonymous` and
/// `transport_url`.
pub struct HubBuilder {
    addr: Option<SocketAddr>,
    transport_kind: TransportKind,
    heartbeat_interval: Duration,
    dispatch_subscriptions: bool,
    debug: bool,
    subscriber_key: Option<DecodingKey>,
    publisher_key: Option<DecodingKey>,
    allow_anonymous: bool,
    issuer: Option<String>,
    subscriber_queue_capacity: usize,
    retention_policy: RetentionPolicy,
    retention_interval: Duration,
    observability_config: Option<ObservabilityConfig>,
    service_name: String,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self {
            addr: None,
            transport_kind: TransportKind::Local,
            heartbeat_interval: Duration::from_secs(15),
            dispatch_subscriptions: false,
            debug: false,
            subscriber_key: None,
            publisher_key: None,
            allow_anonymous: false,
            issuer: None,
            subscriber_queue_capacity: DEFAULT_INBOX_CAPACITY,
            retention_policy: RetentionPolicy::unlimited(),
            retention_interval: Duration::from_secs(60),
            observability_config: None,
            service_name: "mercure-hub".to_string(),
        }
    }

    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Internal(format!("invalid bind address: {e}")))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Zero disables heartbeats, per the configuration-key table.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn dispatch_subscriptions(mut self, enabled: bool) -> Self {
        self.dispatch_subscriptions = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn subscriber_jwt_key(mut self, key: DecodingKey) -> Self {
        self.subscriber_key = Some(key);
        self
    }

    pub fn publisher_jwt_key(mut self, key: DecodingKey) -> Self {
        self.publisher_key = Some(key);
        self
    }

    pub fn allow_anonymous(mut self, allowed: bool) -> Self {
        self.allow_anonymous = allowed;
        self
    }

    pub fn jwt_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Default per-subscriber inbox depth; see [`crate::subscriber::DEFAULT_INBOX_CAPACITY`].
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity;
        self
    }

    /// Select the in-memory transport (the default).
    pub fn local_transport(mut self) -> Self {
        self.transport_kind = TransportKind::Local;
        self
    }

    /// Select the durable sled-backed transport at `db_path`.
    pub fn transport_url(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.transport_kind = TransportKind::Bolt(db_path.into());
        self
    }

    pub fn retention_policy(mut self, policy: RetentionPolicy) -> Self {
        self.retention_policy = policy;
        self
    }

    pub fn retention_interval(mut self, interval: Duration) -> Self {
        self.retention_interval = interval;
        self
    }

    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub async fn build(self) -> Result<MercureHub> {
        let addr = self.addr.unwrap_or_else(|| "127.0.0.1:3000".parse().unwrap());
        let listener = TcpListener::bind(addr).await.map_err(Error::from)?;

        if let Some(config) = &self.observability_config {
            mercure_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(e.to_string()))?;
        }

        let matcher = Arc::new(TopicMatcher::new());
        let mut retention_shutdown_tx = None;

        let transport: Arc<dyn Transport> = match self.transport_kind {
            TransportKind::Local => Arc::new(LocalTransport::new(matcher.clone())),
            TransportKind::Bolt(path) => {
                let bolt = BoltTransport::open(&path, matcher.clone())?;
                bolt.set_retention_policy(self.retention_policy.clone()).await;
                let bolt = Arc::new(bolt);
                let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
                retention_task::spawn_bolt_retention(bolt.clone(), self.retention_interval, shutdown_rx);
                retention_shutdown_tx = Some(shutdown_tx);
                bolt
            }
        };

        let subscriber_authorizer = {
            let mut authorizer = Authorizer::new(self.subscriber_key, self.allow_anonymous);
            if let Some(issuer) = &self.issuer {
                authorizer = authorizer.with_issuer(issuer.clone());
            }
            authorizer
        };
        let publisher_authorizer = {
            let mut authorizer = Authorizer::new(self.publisher_key, false);
            if let Some(issuer) = &self.issuer {
                authorizer = authorizer.with_issuer(issuer.clone());
            }
            authorizer
        };

        let metrics = self
            .observability_config
            .as_ref()
            .map(|_| Arc::new(HubMetrics::new(self.service_name.clone())));

        let state = Arc::new(HubState {
            subscription_events: SubscriptionEventSource::new(transport.clone()),
            transport,
            matcher,
            subscriber_authorizer,
            publisher_authorizer,
            heartbeat_interval: self.heartbeat_interval,
            dispatch_subscriptions: self.dispatch_subscriptions,
            debug: self.debug,
            subscriber_queue_capacity: self.subscriber_queue_capacity,
            metrics,
        });

        let router = AxumRouter::new()
            .route("/", get(subscribe).post(publish))
            .with_state(state.clone());

        Ok(MercureHub {
            listener: Some(listener),
            router: Some(router),
            state,
            retention_shutdown_tx,
        })
    }
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new()
    }
}
