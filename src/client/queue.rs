//! Fila de despacho suspensível.
//!
//! Requisições feitas por [`super::ObjectManager::load`] esperam aqui
//! enquanto a fila está suspensa.

use tokio::sync::watch;
use tracing::debug;

/// Shared suspended flag with change notification.
#[derive(Debug)]
pub struct OperationQueue {
    suspended: watch::Sender<bool>,
}

impl OperationQueue {
    pub fn new() -> Self {
        let (suspended, _) = watch::channel(false);
        Self { suspended }
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended.borrow()
    }

    /// Sets the flag. Returns `true` when the value actually changed;
    /// setting the current value again wakes nobody.
    pub fn set_suspended(&self, suspended: bool) -> bool {
        let changed = self.suspended.send_if_modified(|current| {
            if *current == suspended {
                false
            } else {
                *current = suspended;
                true
            }
        });
        debug!(suspended, changed, "Operation queue suspension updated");
        changed
    }

    /// Resolves immediately when running, otherwise once resumed.
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.suspended.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|suspended| !*suspended).await;
    }

    #[cfg(test)]
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.suspended.subscribe()
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_setting_same_value_is_noop() {
        let queue = OperationQueue::new();
        let rx = queue.subscribe();

        assert!(queue.set_suspended(true));
        assert!(!queue.set_suspended(true));

        assert!(queue.is_suspended());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_wait_until_resumed() {
        let queue = Arc::new(OperationQueue::new());
        queue.set_suspended(true);

        let resumer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            resumer.set_suspended(false);
        });

        tokio::time::timeout(Duration::from_secs(1), queue.wait_until_resumed())
            .await
            .expect("queue resumed");
        assert!(!queue.is_suspended());
    }
}
