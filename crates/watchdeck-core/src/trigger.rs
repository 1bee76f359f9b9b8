use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Debounced trigger: bursts of `request()` calls collapse into one run of
/// the action once `quiet_period` has passed without a new request.
#[derive(Clone)]
pub struct SyncTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl SyncTrigger {
    pub fn spawn<F, Fut>(quiet_period: Duration, cancel: CancellationToken, action: F) -> (Self, JoinHandle<()>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    request = rx.recv() => {
                        if request.is_none() {
                            return;
                        }
                    }
                }

                // Restart the quiet period on every new request
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(quiet_period) => break,
                        request = rx.recv() => {
                            if request.is_none() {
                                break;
                            }
                        }
                    }
                }

                debug!(operation = "sync_trigger", "Quiet period elapsed, running");
                action().await;
            }
        });

        (Self { tx }, handle)
    }

    pub fn request(&self) {
        if self.tx.send(()).is_err() {
            debug!(operation = "sync_trigger", "Trigger already stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_trigger(cancel: CancellationToken) -> (SyncTrigger, JoinHandle<()>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let (trigger, handle) = SyncTrigger::spawn(Duration::from_secs(3), cancel, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (trigger, handle, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_run() {
        let (trigger, _handle, runs) = counting_trigger(CancellationToken::new());

        trigger.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.request();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let (trigger, _handle, runs) = counting_trigger(CancellationToken::new());

        trigger.request();
        tokio::time::sleep(Duration::from_secs(4)).await;
        trigger.request();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_run() {
        let cancel = CancellationToken::new();
        let (trigger, handle, runs) = counting_trigger(cancel.clone());

        trigger.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        trigger.request();
    }
}
