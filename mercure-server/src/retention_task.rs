//! Background task enforcing a durable transport's retention policy.
//!
//! Runs at a configured interval while the hub is alive and exits cleanly
//! on the shutdown signal sent when the owning [`crate::hub::MercureHub`] is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::bolt_transport::BoltTransport;

/// Spawn the periodic retention sweep for a durable transport. Returns
/// immediately; the task runs until `shutdown_rx` observes `true`.
pub fn spawn_bolt_retention(
    transport: Arc<BoltTransport>,
    interval: Duration,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut interval_timer = time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), "starting retention enforcement task");

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match transport.enforce_retention().await {
                        Ok(deleted) if deleted > 0 => {
                            tracing::info!(deleted_count = deleted, "enforced retention policy");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "failed to enforce retention policy");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("retention task shutting down");
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use mercure_core::{Event, TopicMatcher, Update};

    #[tokio::test]
    async fn sweep_deletes_entries_beyond_the_count_limit() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(BoltTransport::open(dir.path(), Arc::new(TopicMatcher::new())).unwrap());
        transport
            .set_retention_policy(crate::retention::RetentionPolicy::by_count(2))
            .await;
        for i in 1..=5 {
            transport
                .dispatch(Update::public("/t", Event::new(i.to_string(), "d")))
                .await
                .unwrap();
        }

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        spawn_bolt_retention(transport.clone(), Duration::from_millis(20), shutdown_rx);
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = shutdown_tx.send(true);

        let remaining = transport.updates_since(0).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
