//! Builds the JSON-LD subscription lifecycle payloads described for the
//! reserved `/.well-known/mercure/subscriptions/{subscriberID}/{topic}`
//! meta-topic, and dispatches them through a transport.

use std::sync::Arc;

use mercure_core::{Event, Result, Subscription, Update};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::transport::Transport;

const SUBSCRIPTIONS_PREFIX: &str = "/.well-known/mercure/subscriptions";

/// The topic IRI a subscription lifecycle event for `(subscriber_id, topic)`
/// is published on, and which also becomes its JSON-LD `@id`.
pub fn subscription_topic(subscriber_id: &str, topic: &str) -> String {
    let encoded_topic = utf8_percent_encode(topic, NON_ALPHANUMERIC);
    format!("{SUBSCRIPTIONS_PREFIX}/{subscriber_id}/{encoded_topic}")
}

/// Emits one subscription-lifecycle update per `(subscriber, requested topic)`
/// pair, as required before registration (active=true) and after
/// deregistration (active=false).
pub struct SubscriptionEventSource {
    transport: Arc<dyn Transport>,
}

impl SubscriptionEventSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn dispatch_lifecycle(
        &self,
        subscriber_id: &str,
        requested_topics: &[String],
        authorized_topics: &[String],
        active: bool,
    ) -> Result<()> {
        for topic in requested_topics {
            let subscription_topic = subscription_topic(subscriber_id, topic);
            let subscription = Subscription::new(
                subscription_topic.clone(),
                topic.clone(),
                requested_topics.to_vec(),
                authorized_topics.to_vec(),
                active,
            );
            let data = serde_json::to_string(&subscription)
                .map_err(|e| mercure_core::Error::Serialization(e.to_string()))?;
            let event = Event::new(subscription_topic.clone(), data);
            self.transport
                .dispatch(Update::public(subscription_topic, event))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_transport::LocalTransport;
    use crate::subscriber::Subscriber;
    use mercure_core::TopicMatcher;

    #[tokio::test]
    async fn active_true_event_carries_topic_and_subscriber() {
        let transport = Arc::new(LocalTransport::new(Arc::new(TopicMatcher::new())));
        let (sub, mut handle) = Subscriber::new(
            "sub-1",
            None,
            vec![SUBSCRIPTIONS_PREFIX.to_string() + "/{subscriber}/{+topic}"],
            vec![],
            false,
            None,
            10,
        );
        transport.add_subscriber(sub).await.unwrap();

        let source = SubscriptionEventSource::new(transport);
        source
            .dispatch_lifecycle("sub-2", &["http://example.com/books/1".to_string()], &[], true)
            .await
            .unwrap();

        let update = handle.inbox_rx.try_recv().unwrap();
        let parsed: Subscription = serde_json::from_str(&update.event.data).unwrap();
        assert!(parsed.active);
        assert_eq!(parsed.topic, "http://example.com/books/1");
    }

    #[test]
    fn subscription_topic_percent_encodes_the_inner_topic() {
        let topic = subscription_topic("sub-1", "http://example.com/books/1");
        assert_eq!(
            topic,
            "/.well-known/mercure/subscriptions/sub-1/http%3A%2F%2Fexample%2Ecom%2Fbooks%2F1"
        );
    }
}
