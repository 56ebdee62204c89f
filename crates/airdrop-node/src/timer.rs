//! Wall-clock timer service on the tokio runtime.
//!
//! Each wakeup is a spawned task sleeping until its deadline. Pending tasks
//! are tracked by [`CancelToken`] so they can be aborted. Wakers always run on
//! a runtime task, never inside [`TimerService::set_wakeup`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use airdrop_core::traits::{TimerService, TimerWaker};
use airdrop_core::types::{CancelToken, Timestamp};

use crate::error::NodeError;

/// Seconds since the Unix epoch.
pub fn unix_now() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

type Tasks = Arc<Mutex<HashMap<CancelToken, JoinHandle<()>>>>;

pub struct TokioTimer {
    handle: Handle,
    tasks: Tasks,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Timer bound to the runtime the caller is running on.
    pub fn from_current() -> Result<Self, NodeError> {
        let handle = Handle::try_current()
            .map_err(|e| NodeError::Config(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(handle))
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Abort every pending wakeup.
    pub fn cancel_all(&self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

impl TimerService for TokioTimer {
    fn current_timestamp(&self) -> Timestamp {
        unix_now()
    }

    fn set_wakeup(&self, at: Timestamp, waker: Arc<dyn TimerWaker>, token: CancelToken) {
        let delay = Duration::from_secs(at.saturating_sub(unix_now()));
        let tasks = Arc::clone(&self.tasks);

        // Holding the map lock across the spawn keeps the task from removing
        // its entry before it is inserted.
        let mut pending = self.tasks.lock();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().remove(&token);
            waker.wake(unix_now());
        });
        if let Some(previous) = pending.insert(token, task) {
            previous.abort();
        }
        debug!(%token, at, delay_secs = delay.as_secs(), "wakeup scheduled");
    }

    fn cancel(&self, token: &CancelToken) -> bool {
        match self.tasks.lock().remove(token) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelWaker(mpsc::UnboundedSender<Timestamp>);

    impl TimerWaker for ChannelWaker {
        fn wake(&self, fired_at: Timestamp) {
            let _ = self.0.send(fired_at);
        }
    }

    fn waker() -> (Arc<dyn TimerWaker>, mpsc::UnboundedReceiver<Timestamp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelWaker(tx)), rx)
    }

    #[tokio::test]
    async fn past_deadline_fires_promptly() {
        let timer = TokioTimer::from_current().unwrap();
        let (w, mut rx) = waker();
        let now = timer.current_timestamp();
        timer.set_wakeup(now.saturating_sub(10), w, CancelToken(1));
        let fired_at = rx.recv().await.unwrap();
        assert!(fired_at >= now);
        tokio::task::yield_now().await;
        assert_eq!(timer.pending_count(), 0);
    }

    #[tokio::test]
    async fn fires_after_deadline() {
        let timer = TokioTimer::from_current().unwrap();
        let (w, mut rx) = waker();
        let at = timer.current_timestamp() + 1;
        timer.set_wakeup(at, w, CancelToken(2));
        let fired_at = rx.recv().await.unwrap();
        assert!(fired_at >= at - 1);
    }

    #[tokio::test]
    async fn cancelled_wakeup_never_fires() {
        let timer = TokioTimer::from_current().unwrap();
        let (w, mut rx) = waker();
        timer.set_wakeup(timer.current_timestamp() + 3_600, w, CancelToken(3));
        assert_eq!(timer.pending_count(), 1);
        assert!(timer.cancel(&CancelToken(3)));
        assert!(!timer.cancel(&CancelToken(3)));
        assert_eq!(timer.pending_count(), 0);
        // The aborted task drops its waker, closing the channel.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn from_current_outside_runtime_fails() {
        assert!(TokioTimer::from_current().is_err());
    }
}
