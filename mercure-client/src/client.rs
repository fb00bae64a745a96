//! SSE-subscribing Mercure client
//!
//! This module provides [`MercureClient`], which opens a long-lived GET
//! request against a hub's subscribe endpoint, decodes the Server-Sent
//! Events it receives into [`mercure_core::Event`]s, and, when configured
//! with a reconnection strategy, reconnects with the last seen event id
//! sent back as `Last-Event-ID` so the hub can resume delivery.
//!
//! # Cloning
//!
//! `MercureClient` is cheaply cloneable. Each [`subscribe`](MercureClient::subscribe)
//! call owns its own background task and connection state independent of
//! any other subscription made from the same client.

use std::sync::Arc;

use futures::StreamExt;
use mercure_core::{Error, Event, Result};
use reqwest_eventsource::{Event as EsEvent, EventSource};
use tokio::sync::{mpsc, watch, RwLock};

use crate::connection_state::ConnectionManager;
use crate::metrics::ClientMetrics;

/// Default channel capacity between the background connection task and
/// whoever is draining [`Subscription::recv`].
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 256;

/// A live subscription to one or more hub topics.
///
/// Dropping it, or calling [`close`](Subscription::close), stops the
/// background task and any pending reconnection attempt.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Event>,
    cancel: watch::Sender<bool>,
}

impl Subscription {
    /// Receive the next event, or `None` once the subscription has given up
    /// (stream closed with no reconnection configured, or the strategy
    /// exhausted its attempts).
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stop the subscription and its reconnect loop.
    pub fn close(&self) {
        let _ = self.cancel.send(true);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

/// Connects to a Mercure hub's subscribe endpoint and streams updates.
#[derive(Clone)]
pub struct MercureClient {
    http: reqwest::Client,
    hub_url: String,
    token: Option<String>,
    connection_manager: Option<Arc<ConnectionManager>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl MercureClient {
    /// Connect with no reconnection and no bearer token. For anything more,
    /// use [`crate::MercureClientBuilder`].
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            hub_url: hub_url.into(),
            token: None,
            connection_manager: None,
            metrics: None,
        }
    }

    /// Start configuring a client with [`crate::MercureClientBuilder`].
    pub fn builder(hub_url: impl Into<String>) -> crate::MercureClientBuilder {
        crate::MercureClientBuilder::new(hub_url)
    }

    pub(crate) fn from_parts(
        hub_url: String,
        token: Option<String>,
        connection_manager: Option<Arc<ConnectionManager>>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            hub_url,
            token,
            connection_manager,
            metrics,
        }
    }

    /// Get the current connection state, if reconnection is enabled.
    pub async fn connection_state(&self) -> Option<crate::ConnectionState> {
        match &self.connection_manager {
            Some(cm) => Some(cm.state().await),
            None => None,
        }
    }

    /// Subscribe to one or more topic selectors. The hub-side matching rules
    /// (exact IRIs, `{var}`/`{+var}` templates, `*`) apply exactly as they do
    /// for any other subscriber.
    pub async fn subscribe(&self, topics: Vec<String>) -> Result<Subscription> {
        if topics.is_empty() {
            return Err(Error::MissingTopic);
        }

        let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIPTION_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let http = self.http.clone();
        let url = self.hub_url.clone();
        let token = self.token.clone();
        let connection_manager = self.connection_manager.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(run_subscription(
            http,
            url,
            token,
            topics,
            connection_manager,
            metrics,
            tx,
            cancel_rx,
        ));

        Ok(Subscription { rx, cancel: cancel_tx })
    }
}

async fn run_subscription(
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    topics: Vec<String>,
    connection_manager: Option<Arc<ConnectionManager>>,
    metrics: Option<Arc<ClientMetrics>>,
    tx: mpsc::Sender<Event>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let last_event_id: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

    loop {
        if *cancel_rx.borrow() {
            return;
        }

        let query: Vec<(&str, String)> = topics.iter().map(|t| ("topic", t.clone())).collect();
        let mut request = http.get(&url).query(&query);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(id) = last_event_id.read().await.clone() {
            request = request.header("Last-Event-ID", id);
        }

        if let Some(cm) = &connection_manager {
            cm.connecting().await;
        }
        if let Some(m) = &metrics {
            m.update_connection_state(1);
        }

        let mut source = match EventSource::new(request) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open subscription request");
                if let Some(m) = &metrics {
                    m.record_error("connect");
                }
                if !wait_for_reconnect(&connection_manager, &metrics, &mut cancel_rx).await {
                    return;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        source.close();
                        return;
                    }
                }
                next = source.next() => {
                    match next {
                        Some(Ok(EsEvent::Open)) => {
                            if let Some(cm) = &connection_manager {
                                cm.connected().await;
                            }
                            if let Some(m) = &metrics {
                                m.update_connection_state(2);
                                m.record_reconnection_success();
                            }
                        }
                        Some(Ok(EsEvent::Message(msg))) => {
                            if !msg.id.is_empty() {
                                *last_event_id.write().await = Some(msg.id.clone());
                            }
                            if let Some(m) = &metrics {
                                m.record_event();
                            }
                            let mut event = Event::new(msg.id, msg.data);
                            if !msg.event.is_empty() && msg.event != "message" {
                                event = event.with_type(msg.event);
                            }
                            if let Some(retry) = msg.retry {
                                event = event.with_retry(retry.as_millis() as u64);
                            }
                            if tx.send(event).await.is_err() {
                                source.close();
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "subscription stream error");
                            if let Some(m) = &metrics {
                                m.record_error("stream");
                            }
                            source.close();
                            break;
                        }
                        None => {
                            source.close();
                            break;
                        }
                    }
                }
            }
        }

        if let Some(cm) = &connection_manager {
            cm.disconnected().await;
        }
        if let Some(m) = &metrics {
            m.update_connection_state(0);
        }
        if !wait_for_reconnect(&connection_manager, &metrics, &mut cancel_rx).await {
            return;
        }
    }
}

/// Consult the reconnection strategy (if any) and sleep for the delay it
/// returns. Returns `false` when the caller should stop: no strategy is
/// configured, the strategy gave up, or the subscription was cancelled
/// while waiting.
async fn wait_for_reconnect(
    connection_manager: &Option<Arc<ConnectionManager>>,
    metrics: &Option<Arc<ClientMetrics>>,
    cancel_rx: &mut watch::Receiver<bool>,
) -> bool {
    let Some(cm) = connection_manager else {
        return false;
    };
    cm.start_reconnecting().await.ok();
    loop {
        match cm.next_reconnect_delay().await {
            Some(delay) => {
                if let Some(m) = metrics {
                    m.record_reconnection_attempt();
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => return true,
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            return false;
                        }
                    }
                }
            }
            None => {
                if let Some(m) = metrics {
                    m.update_connection_state(4);
                }
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_rejects_an_empty_topic_list() {
        let client = MercureClient::new("http://localhost:3000/.well-known/mercure");
        let err = client.subscribe(Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::MissingTopic));
    }

    #[tokio::test]
    async fn connection_state_is_none_without_a_reconnect_strategy() {
        let client = MercureClient::new("http://localhost:3000/.well-known/mercure");
        assert!(client.connection_state().await.is_none());
    }

    #[test]
    fn closing_a_subscription_does_not_panic() {
        let (_tx, rx) = mpsc::channel(1);
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let subscription = Subscription { rx, cancel: cancel_tx };
        subscription.close();
    }
}
