//! Reachability de rede em cache, com notificações de mudança.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

const NOTIFICATION_CAPACITY: usize = 16;

/// Network availability as the HTTP client last observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStatus {
    Unknown,
    NotReachable,
    ReachableViaWwan,
    ReachableViaWifi,
}

impl ReachabilityStatus {
    /// Raw value used by the networking layer (-1, 0, 1, 2).
    pub fn raw_value(self) -> i8 {
        match self {
            Self::Unknown => -1,
            Self::NotReachable => 0,
            Self::ReachableViaWwan => 1,
            Self::ReachableViaWifi => 2,
        }
    }

    pub fn is_reachable(self) -> bool {
        matches!(self, Self::ReachableViaWwan | Self::ReachableViaWifi)
    }
}

/// Payload of a reachability change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityChange {
    pub previous: ReachabilityStatus,
    pub current: ReachabilityStatus,
}

/// HTTP client state shared by every request.
#[derive(Debug)]
pub struct HttpClient {
    status: RwLock<ReachabilityStatus>,
    notifications: broadcast::Sender<ReachabilityChange>,
}

impl HttpClient {
    pub fn new(initial: ReachabilityStatus) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            status: RwLock::new(initial),
            notifications,
        }
    }

    pub async fn reachability(&self) -> ReachabilityStatus {
        *self.status.read().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReachabilityChange> {
        self.notifications.subscribe()
    }

    /// Overwrites the cached status, then notifies observers. The write
    /// lock is released before sending so observers read the new value.
    pub async fn stub_reachability(&self, status: ReachabilityStatus) -> ReachabilityChange {
        let change = {
            let mut guard = self.status.write().await;
            let previous = *guard;
            *guard = status;
            ReachabilityChange {
                previous,
                current: status,
            }
        };

        let observers = self.notifications.send(change).unwrap_or(0);
        info!(
            previous = ?change.previous,
            current = ?change.current,
            observers,
            "Reachability status changed"
        );
        change
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(ReachabilityStatus::Unknown)
    }
}
