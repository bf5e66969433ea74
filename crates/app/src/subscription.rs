//! Cancellable notification subscription.
//!
//! A [`NotificationSubscription`] pumps one [`NotificationStream`] into the
//! [`NotificationRouter`] on its own task. Delivery and cancellation share a
//! gate lock: once [`cancel`](NotificationSubscription::cancel) returns, no
//! payload from that stream reaches the router, even one already read from
//! the stream.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::ports::NotificationStream;
use crate::router::NotificationRouter;

/// Owned handle to a running notification pump.
#[derive(Debug)]
pub struct NotificationSubscription {
    open: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl NotificationSubscription {
    /// Start pumping `stream` into `router`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(mut stream: NotificationStream, router: Arc<NotificationRouter>) -> Self {
        let open = Arc::new(Mutex::new(true));
        let gate = Arc::clone(&open);
        let task = tokio::spawn(async move {
            while let Some(payload) = stream.next().await {
                let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
                if !*open {
                    break;
                }
                router.ingest(&payload);
            }
            tracing::debug!("notification stream ended");
        });
        Self {
            open,
            task: Some(task),
        }
    }

    /// Whether the subscription has not been cancelled yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop delivery and release the stream.
    ///
    /// Returns `true` for the call that actually tore the subscription down;
    /// every later call is a no-op returning `false`.
    pub fn cancel(&mut self) -> bool {
        {
            let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
            if !*open {
                return false;
            }
            *open = false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!("notification subscription cancelled");
        true
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn channel_stream() -> (mpsc::UnboundedSender<Vec<u8>>, NotificationStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn should_deliver_payloads_to_router() {
        let router = Arc::new(NotificationRouter::default());
        let (tx, stream) = channel_stream();
        let _sub = NotificationSubscription::spawn(stream, Arc::clone(&router));

        tx.send(b"1,1,1".to_vec()).unwrap();
        tx.send(b"2,2,3".to_vec()).unwrap();
        settle().await;

        let raws: Vec<_> = router.pending().into_iter().map(|c| c.raw).collect();
        assert_eq!(raws, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn should_stop_delivery_after_cancel() {
        let router = Arc::new(NotificationRouter::default());
        let (tx, stream) = channel_stream();
        let mut sub = NotificationSubscription::spawn(stream, Arc::clone(&router));

        tx.send(b"1,1,1".to_vec()).unwrap();
        settle().await;
        assert!(sub.cancel());

        let _ = tx.send(b"2,1,1".to_vec());
        settle().await;
        assert_eq!(router.pending().len(), 1);
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn should_cancel_exactly_once() {
        let router = Arc::new(NotificationRouter::default());
        let (_tx, stream) = channel_stream();
        let mut sub = NotificationSubscription::spawn(stream, router);

        assert!(sub.is_active());
        assert!(sub.cancel());
        assert!(!sub.cancel());
        assert!(!sub.cancel());
    }

    #[tokio::test]
    async fn should_release_stream_on_cancel() {
        let router = Arc::new(NotificationRouter::default());
        let (tx, stream) = channel_stream();
        let mut sub = NotificationSubscription::spawn(stream, router);

        sub.cancel();
        settle().await;
        assert!(tx.is_closed());
    }
}
