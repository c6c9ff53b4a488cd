use tokio::sync::watch;

/// Cooperative cancellation signal owned by exactly one stream session.
///
/// The flag is set-once: firing it twice has no further effect and it can
/// never be reset. Observers use `is_cancelled` (level-triggered) or
/// `cancelled().await` (edge-triggered, for interrupting a blocked read).
#[derive(Debug)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates an unfired token.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Returns a cloneable handle that can fire this token.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.tx.clone(),
        }
    }

    /// Whether the token has been fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is fired; immediately if it already was.
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` next to a read.
    pub async fn cancelled(&mut self) {
        // The token holds a sender itself, so the channel never closes.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle used by the stop action to fire a session's `CancelToken`.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Fires the token.
    ///
    /// Returns `true` only for the call that actually fired it; concurrent or
    /// repeated calls return `false`.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the token has been fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_set_once() {
        let token = CancelToken::new();
        let handle = token.handle();
        assert!(!token.is_cancelled());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.clone().cancel());
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_fired() {
        let mut token = CancelToken::new();
        token.handle().cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test]
    async fn cancelled_wakes_a_blocked_waiter() {
        let mut token = CancelToken::new();
        let handle = token.handle();
        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            token.is_cancelled()
        });
        tokio::task::yield_now().await;
        handle.cancel();
        let observed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("join");
        assert!(observed);
    }

    #[tokio::test]
    async fn concurrent_cancels_fire_exactly_once() {
        let token = CancelToken::new();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handle = token.handle();
            tasks.push(tokio::spawn(async move { handle.cancel() }));
        }
        let mut fired = 0;
        for task in tasks {
            if task.await.expect("join") {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_pends_until_fired() {
        let mut token = CancelToken::new();
        let result = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(result.is_err());
    }
}
