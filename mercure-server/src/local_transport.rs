//! Pure in-memory transport: no persistence, no history replay. Dispatch
//! takes a read-lock and fans out non-blockingly; registration takes a
//! write-lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mercure_core::{Error, Result, TopicMatcher, Update};
use tokio::sync::RwLock;

use crate::subscriber::Subscriber;
use crate::transport::Transport;

/// In-memory fan-out transport. Cheap to construct; holds no file handles.
pub struct LocalTransport {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    matcher: Arc<TopicMatcher>,
    closed: std::sync::atomic::AtomicBool,
}

impl LocalTransport {
    pub fn new(matcher: Arc<TopicMatcher>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            matcher,
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(Arc::new(TopicMatcher::new()))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn dispatch(&self, update: Update) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(Error::TransportClosed);
        }
        let subscribers = self.subscribers.read().await;
        let mut to_drop = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if !crate::matching::accepts(&self.matcher, subscriber, &update) {
                continue;
            }
            if !subscriber.try_enqueue(update.clone()) {
                tracing::warn!(subscriber = %id, "inbox full, disconnecting slow subscriber");
                subscriber.disconnect();
                to_drop.push(id.clone());
            }
        }
        drop(subscribers);
        if !to_drop.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in to_drop {
                subscribers.remove(&id);
            }
        }
        Ok(())
    }

    async fn add_subscriber(&self, subscriber: Subscriber) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(Error::TransportClosed);
        }
        self.subscribers
            .write()
            .await
            .insert(subscriber.id.clone(), subscriber);
        Ok(())
    }

    async fn remove_subscriber(&self, id: &str) {
        self.subscribers.write().await.remove(id);
    }

    async fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        let mut subscribers = self.subscribers.write().await;
        for subscriber in subscribers.values() {
            subscriber.disconnect();
        }
        subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercure_core::Event;

    fn matcher() -> Arc<TopicMatcher> {
        Arc::new(TopicMatcher::new())
    }

    #[tokio::test]
    async fn dispatch_delivers_to_matching_subscriber() {
        let transport = LocalTransport::new(matcher());
        let (sub, mut handle) = Subscriber::new(
            "s1",
            None,
            vec!["http://example.com/books/1".into()],
            vec![],
            false,
            None,
            10,
        );
        transport.add_subscriber(sub).await.unwrap();
        transport
            .dispatch(Update::public(
                "http://example.com/books/1",
                Event::new("b", "Hello World"),
            ))
            .await
            .unwrap();
        let received = handle.inbox_rx.try_recv().unwrap();
        assert_eq!(received.event.id, "b");
    }

    #[tokio::test]
    async fn dispatch_skips_non_matching_subscriber() {
        let transport = LocalTransport::new(matcher());
        let (sub, mut handle) = Subscriber::new("s1", None, vec!["other".into()], vec![], false, None, 10);
        transport.add_subscriber(sub).await.unwrap();
        transport
            .dispatch(Update::public("http://example.com/books/1", Event::new("b", "x")))
            .await
            .unwrap();
        assert!(handle.inbox_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn private_update_requires_authorization() {
        let transport = LocalTransport::new(matcher());
        let (sub, mut handle) = Subscriber::new(
            "s1",
            None,
            vec!["http://example.com/reviews/{id}".into()],
            vec![],
            false,
            None,
            10,
        );
        transport.add_subscriber(sub).await.unwrap();
        transport
            .dispatch(Update::private("http://example.com/reviews/22", Event::new("a", "x")))
            .await
            .unwrap();
        assert!(handle.inbox_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_inbox_disconnects_subscriber_without_blocking_others() {
        let transport = LocalTransport::new(matcher());
        let (slow, mut slow_handle) = Subscriber::new("slow", None, vec!["*".into()], vec![], false, None, 1);
        let (fast, mut fast_handle) = Subscriber::new("fast", None, vec!["*".into()], vec![], false, None, 10);
        transport.add_subscriber(slow).await.unwrap();
        transport.add_subscriber(fast).await.unwrap();

        transport.dispatch(Update::public("t", Event::new("1", "a"))).await.unwrap();
        transport.dispatch(Update::public("t", Event::new("2", "b"))).await.unwrap();

        assert!(slow_handle.disconnected_rx.changed().await.is_ok());
        assert!(*slow_handle.disconnected_rx.borrow());
        assert!(fast_handle.inbox_rx.try_recv().is_ok());
        assert!(fast_handle.inbox_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn close_disconnects_all_and_rejects_new_dispatch() {
        let transport = LocalTransport::new(matcher());
        let (sub, handle) = Subscriber::new("s1", None, vec!["*".into()], vec![], false, None, 10);
        transport.add_subscriber(sub).await.unwrap();
        transport.close().await;
        assert!(*handle.disconnected_rx.borrow());
        assert!(transport.dispatch(Update::public("t", Event::new("1", "a"))).await.is_err());
    }
}
