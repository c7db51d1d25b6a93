//! Fixed-period driver for `FastPass::tick`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tandem_core::{FastPass, Snapshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RuntimeError};

pub type TickResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Running heartbeat task. Dropping the handle does not stop the task; call
/// [`Heartbeat::stop`] or [`Heartbeat::shutdown`].
pub struct Heartbeat {
    token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl Heartbeat {
    /// Spawn the tick loop on the current runtime.
    ///
    /// `on_tick` receives a copy of every snapshot. An error or panic from it
    /// is logged and the loop keeps going. Late ticks are skipped rather than
    /// bursted, so a stalled runtime never replays a backlog.
    pub fn start<F>(fast: Arc<FastPass>, period: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut(Snapshot) -> TickResult + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = 0u64;
            tracing::info!("heartbeat started at {}ms", period.as_millis());

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        let snapshot = fast.tick();
                        ticks += 1;
                        match catch_unwind(AssertUnwindSafe(|| on_tick(snapshot))) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::warn!("tick {} callback failed: {e}", snapshot.tick),
                            Err(_) => tracing::warn!("tick {} callback panicked", snapshot.tick),
                        }
                    }
                }
            }

            tracing::info!("heartbeat stopped after {ticks} ticks");
            ticks
        });

        Ok(Self { token, handle })
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.handle.is_finished()
    }

    /// Wait for the loop to exit. Returns the number of ticks it ran.
    pub async fn join(self) -> Result<u64> {
        Ok(self.handle.await?)
    }

    pub async fn shutdown(self) -> Result<u64> {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let fast = Arc::new(FastPass::with_defaults());
        let seen = Arc::new(AtomicU64::new(0));
        let counter = seen.clone();
        let heartbeat = Heartbeat::start(fast.clone(), Duration::from_millis(2), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let ticks = heartbeat.shutdown().await.unwrap();
        assert!(ticks >= 3, "only {ticks} ticks");
        assert_eq!(seen.load(Ordering::SeqCst), ticks);
        assert_eq!(fast.snapshot().tick, ticks);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_halt_ticks() {
        let fast = Arc::new(FastPass::with_defaults());
        let heartbeat = Heartbeat::start(fast.clone(), Duration::from_millis(2), |snapshot| {
            match snapshot.tick % 3 {
                0 => Err("refused".into()),
                1 => panic!("callback blew up on tick {}", snapshot.tick),
                _ => Ok(()),
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!heartbeat.is_stopped());
        let ticks = heartbeat.shutdown().await.unwrap();
        assert!(ticks >= 5, "only {ticks} ticks");
    }

    #[test]
    fn test_start_outside_runtime_is_an_error() {
        let fast = Arc::new(FastPass::with_defaults());
        let result = Heartbeat::start(fast, Duration::from_millis(10), |_| Ok(()));
        assert!(matches!(result, Err(RuntimeError::NoRuntime)));
    }
}
