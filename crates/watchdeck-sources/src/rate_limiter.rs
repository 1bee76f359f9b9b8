use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(1200);

/// Process-wide gate in front of throttled metadata APIs.
///
/// Only one call is in flight at a time. Each caller waits `delay` after
/// acquiring the gate and before running its request, so throughput is capped
/// at one call per `delay`. tokio's mutex is fair, so callers are served in
/// the order they started waiting.
pub struct RateLimiter {
    gate: Mutex<()>,
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            gate: Mutex::new(()),
            delay,
        }
    }

    /// Run `action` under the gate. Its output, including any error, is
    /// returned unchanged; the gate is released either way.
    pub async fn execute_safe<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.gate.lock().await;
        trace!(delay_ms = self.delay.as_millis() as u64, "Rate limiter acquired");
        tokio::time::sleep(self.delay).await;
        action().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_and_served_in_order() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1200)));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..3u32 {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .execute_safe(|| async move {
                        order.lock().unwrap().push(i);
                        Instant::now()
                    })
                    .await
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(finished[0] - start >= Duration::from_millis(1200));
        assert!(finished[1] - finished[0] >= Duration::from_millis(1200));
        assert!(finished[2] - finished[1] >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_propagates_and_gate_is_released() {
        let limiter = RateLimiter::new(Duration::from_millis(10));

        let failed: Result<u32, String> = limiter
            .execute_safe(|| async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));

        let ok: Result<u32, String> = limiter.execute_safe(|| async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_happens_before_action() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        let ran_at = limiter.execute_safe(|| async { Instant::now() }).await;
        assert!(ran_at - start >= Duration::from_millis(500));
    }
}
