use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::cache::manager::CompositeCache;

/// Background task that periodically drops idle cache entries.
///
/// Holds only a weak reference to the cache, so it never keeps the cache alive; it stops on
/// [`Evictor::shutdown`], on drop, or once the cache itself is gone.
#[derive(Debug)]
pub struct Evictor {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Evictor {
    /// Start evicting with the cache's configured interval and max age.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cache: &Arc<CompositeCache>) -> Self {
        let cfg = cache.config();
        Self::spawn_with(cache, cfg.eviction_interval(), cfg.cache_max_age())
    }

    /// Start evicting every `period`, dropping entries idle for at least `max_age`.
    pub fn spawn_with(cache: &Arc<CompositeCache>, period: Duration, max_age: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            Arc::downgrade(cache),
            period.max(Duration::from_millis(1)),
            max_age,
            cancel.clone(),
        ));
        tracing::debug!(?period, ?max_age, "cache evictor started");
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Token that stops the task when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(%err, "cache evictor task failed");
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    cache: Weak<CompositeCache>,
    period: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(cache) = cache.upgrade() else {
            tracing::debug!("cache dropped, evictor exiting");
            break;
        };
        let evicted = cache.evict_stale(max_age);
        if evicted > 0 {
            tracing::debug!(evicted, "periodic cache eviction");
        }
    }
}
