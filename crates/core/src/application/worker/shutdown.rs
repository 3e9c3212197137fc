// Worker Cancellation Token

use tokio::sync::watch;

/// Cancellation signal shared by every worker in the pool.
///
/// Workers only look at it before taking the next job, so a job that is
/// already running always finishes and gets acknowledged.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal.
    ///
    /// Resolves immediately if shutdown was already requested, including
    /// before this token was cloned. Also resolves if the sender is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all workers
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_after_signal_returns_immediately() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let mut late = token.clone();
        assert!(late.is_shutdown());
        tokio::time::timeout(Duration::from_millis(100), late.wait())
            .await
            .expect("already-signalled token must not block");
    }

    #[tokio::test]
    async fn test_wait_wakes_every_clone() {
        let (tx, token) = shutdown_channel();
        let mut waiters = tokio::task::JoinSet::new();
        for _ in 0..4 {
            let mut token = token.clone();
            waiters.spawn(async move { token.wait().await });
        }

        tokio::task::yield_now().await;
        tx.shutdown();

        let mut woke = 0;
        while let Some(result) = waiters.join_next().await {
            result.unwrap();
            woke += 1;
        }
        assert_eq!(woke, 4);
    }

    #[tokio::test]
    async fn test_dropped_sender_releases_waiters() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);
        tokio::time::timeout(Duration::from_millis(100), token.wait())
            .await
            .expect("dropped sender must not hang waiters");
        assert!(!token.is_shutdown());
    }
}
