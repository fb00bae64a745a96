//! Wire-level data types shared by the hub's transports, matcher and
//! handlers: [`Event`], [`Update`] and the JSON-LD [`Subscription`] payload.

use serde::{Deserialize, Serialize};

/// A single SSE event: an id, a (possibly multi-line) data payload, and
/// optional `event:`/`retry:` fields.
///
/// An absent `id` is allowed but disables history replay for that event,
/// since replay is keyed by event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// SSE event id. Empty string means "no id" on the wire.
    #[serde(default)]
    pub id: String,
    /// Event body. May contain embedded newlines; each line becomes its
    /// own `data:` field when framed.
    pub data: String,
    /// SSE `event:` field. Empty string means "omit".
    #[serde(default)]
    pub r#type: String,
    /// SSE `retry:` field in milliseconds. Zero means "omit".
    #[serde(default)]
    pub retry: u64,
}

impl Event {
    /// Build an event carrying only `id` and `data`.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            r#type: String::new(),
            retry: 0,
        }
    }

    /// Set the SSE `event:` type.
    pub fn with_type(mut self, r#type: impl Into<String>) -> Self {
        self.r#type = r#type.into();
        self
    }

    /// Set the SSE `retry:` value in milliseconds.
    pub fn with_retry(mut self, retry: u64) -> Self {
        self.retry = retry;
        self
    }
}

/// A published update: one or more topics, an [`Event`] body, and whether
/// the update is private (restricted to authorized subscribers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    /// Non-empty list of topic IRIs this update concerns.
    pub topics: Vec<String>,
    /// The SSE payload to deliver.
    pub event: Event,
    /// If true, only subscribers authorized for one of `topics` receive it.
    #[serde(default)]
    pub private: bool,
}

impl Update {
    /// Build a public update on a single topic.
    pub fn public(topic: impl Into<String>, event: Event) -> Self {
        Self {
            topics: vec![topic.into()],
            event,
            private: false,
        }
    }

    /// Build a private update on a single topic.
    pub fn private(topic: impl Into<String>, event: Event) -> Self {
        Self {
            topics: vec![topic.into()],
            event,
            private: true,
        }
    }

    /// Build an update addressed to multiple topics at once.
    pub fn multi(topics: Vec<String>, event: Event, private: bool) -> Self {
        Self {
            topics,
            event,
            private,
        }
    }
}

/// JSON-LD representation of a subscription's lifecycle, emitted on the
/// reserved `/.well-known/mercure/subscriptions/{id}/{topic}` meta-topic
/// when subscription events are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub r#type: String,
    pub topic: String,
    pub subscribe: Vec<String>,
    pub publish: Vec<String>,
    pub active: bool,
}

impl Subscription {
    pub const TYPE: &'static str = "https://mercure.rocks/Subscription";

    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        subscribe: Vec<String>,
        publish: Vec<String>,
        active: bool,
    ) -> Self {
        Self {
            id: id.into(),
            r#type: Self::TYPE.to_string(),
            topic: topic.into(),
            subscribe,
            publish,
            active,
        }
    }
}
