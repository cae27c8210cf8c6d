//! Background expiration sweeper.
//!
//! Lookups already treat expired entries as missing, but a key that
//! is never touched again would otherwise sit in memory forever. The
//! sweeper wakes on a fixed interval and asks the engine to reclaim
//! every expired entry. It takes no lock beyond the shard currently
//! being swept.

use crate::storage::DataStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Time between sweep passes.
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Handle to the running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper over `store`.
    pub fn start(store: Arc<DataStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(store, config, shutdown_rx));
        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<DataStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper stopping");
                    return;
                }
            }
        }

        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "expired keys reclaimed");
        }
    }
}

/// Starts the sweeper with the default once-per-minute interval.
pub fn start_expiry_sweeper(store: Arc<DataStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_keys() {
        let store = Arc::new(DataStore::new());

        for i in 0..10 {
            store.set(
                Bytes::from(format!("key{}", i)),
                Bytes::from("value"),
                Some(Duration::from_millis(50)),
            );
        }
        store.set(Bytes::from("persistent"), Bytes::from("value"), None);
        assert_eq!(store.len(), 11);

        let config = ExpiryConfig {
            interval: Duration::from_millis(10),
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len(), 1);
        assert!(store.exists(b"persistent"));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let store = Arc::new(DataStore::new());

        {
            let _sweeper = ExpirySweeper::start(
                Arc::clone(&store),
                ExpiryConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set(
            Bytes::from("key"),
            Bytes::from("value"),
            Some(Duration::from_millis(10)),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;

        // No sweeper ran, but the entry is still logically absent.
        assert_eq!(store.get(b"key"), Ok(None));
        assert_eq!(store.len(), 1);
    }
}
