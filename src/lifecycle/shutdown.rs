//! Exactly-once shutdown coordination.

use std::sync::OnceLock;

use futures_util::future::{BoxFuture, FutureExt, Shared};

/// One-shot guard for a shutdown sequence.
///
/// The first call to [`StopGuard::run`] starts the sequence; every call,
/// including concurrent ones, awaits that same sequence and receives a clone
/// of its result. The sequence is expected to be driven by a spawned task
/// so that it runs to completion even if every caller stops polling.
pub struct StopGuard<T: Clone> {
    sequence: OnceLock<Shared<BoxFuture<'static, T>>>,
}

impl<T> StopGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            sequence: OnceLock::new(),
        }
    }

    /// Start the sequence with `begin` unless it was already started, then
    /// wait for its result.
    ///
    /// `begin` is invoked at most once over the guard's lifetime.
    pub async fn run<F>(&self, begin: F) -> T
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let sequence = self.sequence.get_or_init(|| begin().shared()).clone();
        sequence.await
    }
}

impl<T> Default for StopGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> std::fmt::Debug for StopGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopGuard")
            .field("triggered", &self.sequence.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_calls_run_once() {
        let guard = StopGuard::<u32>::new();
        let runs = AtomicUsize::new(0);

        let first = guard
            .run(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { 7 }.boxed()
            })
            .await;
        let second = guard
            .run(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { 9 }.boxed()
            })
            .await;

        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_run() {
        let guard = Arc::new(StopGuard::<Result<(), String>>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            let runs = runs.clone();
            tasks.push(tokio::spawn(async move {
                guard
                    .run(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err("timed out".to_string())
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), Err("timed out".to_string()));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_restart_sequence() {
        let guard = StopGuard::<u32>::new();
        let runs = AtomicUsize::new(0);

        let sequence = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            1
        });
        let first = guard.run(|| {
            runs.fetch_add(1, Ordering::SeqCst);
            async move { sequence.await.unwrap_or(0) }.boxed()
        });
        // Poll once to start, then give up on the first caller.
        let _ = tokio::time::timeout(Duration::from_millis(5), first).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let second = guard
            .run(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                async { 2 }.boxed()
            })
            .await;
        assert_eq!(second, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn untriggered_guard_debug() {
        let guard = StopGuard::<u32>::default();
        assert_eq!(format!("{guard:?}"), "StopGuard { triggered: false }");
    }
}
