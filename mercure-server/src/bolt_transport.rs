//! Durable, sled-backed transport. Every dispatched update is persisted
//! under a monotonically increasing sequence before fan-out, with a
//! secondary `event id -> sequence` index so a reconnecting subscriber's
//! `Last-Event-ID` can be resolved to a replay starting point.
//!
//! Eviction (age/count/size bound) is delegated to [`crate::retention_task::run_retention_task`],
//! which calls back into [`BoltTransport::enforce_retention`] on a timer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mercure_core::{Error, Result, TopicMatcher, Update};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::retention::RetentionPolicy;
use crate::subscriber::Subscriber;
use crate::transport::Transport;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUpdate {
    sequence: u64,
    update: Update,
    timestamp: u64,
}

/// Durable transport backed by an embedded sled database.
pub struct BoltTransport {
    #[allow(dead_code)]
    db: sled::Db,
    log_tree: sled::Tree,
    event_index_tree: sled::Tree,
    next_sequence: AtomicU64,
    subscribers: RwLock<HashMap<String, Subscriber>>,
    matcher: Arc<TopicMatcher>,
    retention: RwLock<RetentionPolicy>,
    closed: std::sync::atomic::AtomicBool,
}

impl BoltTransport {
    pub fn open(db_path: impl AsRef<Path>, matcher: Arc<TopicMatcher>) -> Result<Self> {
        let db = sled::open(db_path)?;
        let log_tree = db.open_tree("updates")?;
        let event_index_tree = db.open_tree("event_index")?;

        let next_sequence = log_tree
            .iter()
            .keys()
            .last()
            .and_then(|k| k.ok())
            .map(|k| sequence_from_key(&k) + 1)
            .unwrap_or(1);

        Ok(Self {
            db,
            log_tree,
            event_index_tree,
            next_sequence: AtomicU64::new(next_sequence),
            subscribers: RwLock::new(HashMap::new()),
            matcher,
            retention: RwLock::new(RetentionPolicy::unlimited()),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub async fn set_retention_policy(&self, policy: RetentionPolicy) {
        *self.retention.write().await = policy;
    }

    /// Delete updates that fall outside the configured retention policy.
    /// Called periodically by [`crate::retention_task::run_retention_task`].
    pub async fn enforce_retention(&self) -> Result<usize> {
        let policy = self.retention.read().await.clone();
        if !policy.has_limits() {
            return Ok(0);
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let mut entries = Vec::new();
        for item in self.log_tree.iter() {
            let (key, value) = item?;
            let stored: StoredUpdate = bincode::deserialize(&value)
                .map_err(|e| Error::Storage(e.to_string()))?;
            entries.push((key.to_vec(), stored));
        }

        let total_count = entries.len();
        let mut running_bytes: usize = entries.iter().map(|(_, s)| s.update.event.data.len()).sum();
        let mut remaining = total_count;
        let mut to_delete = Vec::new();

        for (key, stored) in &entries {
            let mut delete = !policy.should_retain_by_age(stored.timestamp, now);
            if let Some(max_count) = policy.max_count {
                if remaining > max_count {
                    delete = true;
                    remaining -= 1;
                }
            }
            if let Some(max_bytes) = policy.max_bytes {
                if running_bytes > max_bytes {
                    delete = true;
                    running_bytes = running_bytes.saturating_sub(stored.update.event.data.len());
                }
            }
            if delete {
                to_delete.push((key.clone(), stored.update.event.id.clone()));
            }
        }

        let deleted = to_delete.len();
        for (key, event_id) in to_delete {
            self.log_tree.remove(&key)?;
            if !event_id.is_empty() {
                self.event_index_tree.remove(event_id.as_bytes())?;
            }
        }
        if deleted > 0 {
            self.log_tree.flush_async().await?;
            self.event_index_tree.flush_async().await?;
        }
        Ok(deleted)
    }

    async fn persist(&self, update: &Update) -> Result<u64> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let stored = StoredUpdate {
            sequence,
            update: update.clone(),
            timestamp,
        };
        let value = bincode::serialize(&stored).map_err(|e| Error::Storage(e.to_string()))?;
        self.log_tree.insert(sequence_key(sequence), value)?;
        if !update.event.id.is_empty() {
            self.event_index_tree
                .insert(update.event.id.as_bytes(), &sequence.to_be_bytes())?;
        }
        self.log_tree.flush_async().await?;
        self.event_index_tree.flush_async().await?;
        Ok(sequence)
    }

    pub(crate) async fn updates_since(&self, since_sequence: u64) -> Result<Vec<Update>> {
        let mut out = Vec::new();
        for item in self.log_tree.range(sequence_key(since_sequence + 1)..) {
            let (_, value) = item?;
            let stored: StoredUpdate =
                bincode::deserialize(&value).map_err(|e| Error::Storage(e.to_string()))?;
            out.push(stored.update);
        }
        Ok(out)
    }

    fn sequence_for_event_id(&self, event_id: &str) -> Result<u64> {
        match self.event_index_tree.get(event_id.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| Error::Storage("corrupt event index entry".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }
}

fn sequence_key(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

fn sequence_from_key(key: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&key[..8]);
    u64::from_be_bytes(arr)
}

#[async_trait]
impl Transport for BoltTransport {
    async fn dispatch(&self, update: Update) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::TransportClosed);
        }
        self.persist(&update).await?;

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
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::TransportClosed);
        }
        self.subscribers.write().await.insert(subscriber.id.clone(), subscriber);
        Ok(())
    }

    async fn remove_subscriber(&self, id: &str) {
        self.subscribers.write().await.remove(id);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut subscribers = self.subscribers.write().await;
        for subscriber in subscribers.values() {
            subscriber.disconnect();
        }
        subscribers.clear();
    }

    async fn dispatch_history(&self, subscriber: &Subscriber, since_event_id: &str) -> Result<()> {
        let since_sequence = self.sequence_for_event_id(since_event_id)?;
        for update in self.updates_since(since_sequence).await? {
            if crate::matching::accepts(&self.matcher, subscriber, &update) {
                if !subscriber.try_enqueue(update) {
                    subscriber.disconnect();
                    break;
                }
            }
        }
        Ok(())
    }

    fn supports_history(&self) -> bool {
        true
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
    async fn dispatch_persists_and_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let transport = BoltTransport::open(dir.path(), matcher()).unwrap();
        let (sub, mut handle) = Subscriber::new("s1", None, vec!["/foos/{id}".into()], vec![], false, None, 10);
        transport.add_subscriber(sub).await.unwrap();
        transport
            .dispatch(Update::public("/foos/a", Event::new("a", "d1")))
            .await
            .unwrap();
        assert_eq!(handle.inbox_rx.try_recv().unwrap().event.id, "a");
    }

    #[tokio::test]
    async fn replay_since_last_event_id_returns_only_newer_updates() {
        let dir = tempfile::tempdir().unwrap();
        let transport = BoltTransport::open(dir.path(), matcher()).unwrap();
        transport.dispatch(Update::public("/foos/a", Event::new("a", "d1"))).await.unwrap();
        transport.dispatch(Update::public("/foos/b", Event::new("b", "d2"))).await.unwrap();

        let (sub, mut handle) = Subscriber::new("s1", None, vec!["/foos/{id}".into()], vec![], false, Some("a".into()), 10);
        transport.dispatch_history(&sub, "a").await.unwrap();
        let replayed = handle.inbox_rx.try_recv().unwrap();
        assert_eq!(replayed.event.id, "b");
        assert!(handle.inbox_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_last_event_id_replays_from_the_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let transport = BoltTransport::open(dir.path(), matcher()).unwrap();
        transport.dispatch(Update::public("/foos/a", Event::new("a", "d1"))).await.unwrap();

        let (sub, mut handle) = Subscriber::new("s1", None, vec!["/foos/{id}".into()], vec![], false, None, 10);
        transport.dispatch_history(&sub, "missing").await.unwrap();
        assert_eq!(handle.inbox_rx.try_recv().unwrap().event.id, "a");
    }

    #[tokio::test]
    async fn retention_by_count_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let transport = BoltTransport::open(dir.path(), matcher()).unwrap();
        transport.set_retention_policy(RetentionPolicy::by_count(2)).await;
        for i in 1..=5 {
            transport
                .dispatch(Update::public("/foos/x", Event::new(i.to_string(), "d")))
                .await
                .unwrap();
        }
        let deleted = transport.enforce_retention().await.unwrap();
        assert_eq!(deleted, 3);
        let remaining = transport.updates_since(0).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let transport = BoltTransport::open(dir.path(), matcher()).unwrap();
            transport.dispatch(Update::public("/x", Event::new("1", "a"))).await.unwrap();
        }
        let reopened = BoltTransport::open(dir.path(), matcher()).unwrap();
        assert_eq!(reopened.next_sequence.load(Ordering::SeqCst), 2);
    }
}
