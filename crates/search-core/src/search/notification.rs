//! Search parameter change notifications.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::SearchParameterInfo;

/// Published after every reconciliation or status change.
///
/// `updated` lists the parameters whose flags changed; it may be empty.
#[derive(Debug, Clone)]
pub struct SearchParametersUpdated {
    pub updated: Vec<Arc<SearchParameterInfo>>,
}

impl SearchParametersUpdated {
    /// Creates a notification.
    pub fn new(updated: Vec<Arc<SearchParameterInfo>>) -> Self {
        Self { updated }
    }

    /// URLs of the changed parameters.
    pub fn urls(&self) -> Vec<&str> {
        self.updated.iter().map(|p| p.url.as_str()).collect()
    }
}

/// Receives change notifications from the status manager.
#[async_trait]
pub trait SearchParameterChangePublisher: Send + Sync {
    /// Publishes a notification. Delivery failures are not reported.
    async fn publish(&self, event: SearchParametersUpdated);
}

/// Publisher backed by a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct BroadcastChangePublisher {
    tx: broadcast::Sender<SearchParametersUpdated>,
}

impl BroadcastChangePublisher {
    /// Creates a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SearchParametersUpdated> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastChangePublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl SearchParameterChangePublisher for BroadcastChangePublisher {
    async fn publish(&self, event: SearchParametersUpdated) {
        let count = event.updated.len();
        // No receivers is fine.
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(updated = count, receivers, "Published search parameter update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchParamType;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let publisher = BroadcastChangePublisher::default();
        let mut rx = publisher.subscribe();

        let param = Arc::new(SearchParameterInfo::new(
            "http://example.org/sp",
            "sp",
            SearchParamType::String,
        ));
        publisher
            .publish(SearchParametersUpdated::new(vec![param]))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.urls(), vec!["http://example.org/sp"]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = BroadcastChangePublisher::default();
        publisher
            .publish(SearchParametersUpdated::new(Vec::new()))
            .await;
    }
}
