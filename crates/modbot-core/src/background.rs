//! Fire-and-forget executor for outbound side calls.
//!
//! Deletions, forwards and exchange requests are best-effort: callers submit
//! them here and never await the result. Failures are logged, not returned.

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::Result;

#[derive(Clone, Default)]
pub struct Background {
    tracker: TaskTracker,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(e) = fut.await {
                warn!(task = label, error = %e, "background task failed");
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every submitted task (including ones they spawn) has finished.
    pub async fn idle(&self) {
        while !self.tracker.is_empty() {
            self.tracker.close();
            self.tracker.wait().await;
            self.tracker.reopen();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test]
    async fn idle_waits_for_nested_tasks() {
        let bg = Background::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_bg = bg.clone();
        let inner_hits = hits.clone();
        bg.spawn("outer", async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            let h = inner_hits.clone();
            inner_bg.spawn("inner", async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            inner_hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bg.spawn("failing", async { Err(Error::External("boom".to_string())) });

        bg.idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bg.pending(), 0);
    }
}
