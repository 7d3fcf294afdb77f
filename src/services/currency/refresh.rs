//! Timer-driven background refresh of currency rates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::CurrencyService;

/// Maximum number of doublings applied to the interval after failures.
const MAX_BACKOFF_STEPS: u32 = 3;

/// Shortest retry delay after a failed fetch.
const MIN_RETRY: Duration = Duration::from_secs(30);

/// Periodically fetches rates and publishes them to subscribers.
///
/// The refresher runs in its own tokio task until [`RateRefresher::shutdown`].
pub struct RateRefresher {
    task_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl RateRefresher {
    /// Spawn the refresh loop. The first fetch happens immediately; a zero
    /// interval fetches once and exits.
    pub fn spawn(service: CurrencyService, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());

        let running_clone = Arc::clone(&running);
        let wake_clone = Arc::clone(&wake);
        let task_handle = tokio::spawn(async move {
            refresh_loop(service, interval, running_clone, wake_clone).await;
        });

        Self {
            task_handle: Some(task_handle),
            running,
            wake,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                warn!("Rate refresh task panicked: {}", e);
            }
        }
    }
}

/// Delay before the next fetch, doubled per consecutive failure.
fn next_delay(interval: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }
    let base = interval.min(MIN_RETRY.max(interval / 8));
    base * 2u32.pow(failures.min(MAX_BACKOFF_STEPS))
}

async fn refresh_loop(
    service: CurrencyService,
    interval: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    let mut failures: u32 = 0;
    loop {
        match service.refresh().await {
            Ok(count) => {
                failures = 0;
                info!(count, "Currency rates refreshed");
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(failures, "Currency refresh failed: {:#}", e);
            }
        }

        if interval.is_zero() || !running.load(Ordering::SeqCst) {
            break;
        }

        let delay = next_delay(interval, failures);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wake.notified() => {}
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }
    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::currency::providers::CurrencyProvider;
    use crate::services::currency::RateBatch;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CurrencyProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_rates(&self) -> anyhow::Result<RateBatch> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                anyhow::bail!("offline");
            }
            Ok(RateBatch {
                base: "EUR".to_string(),
                timestamp: Utc::now(),
                rates: [("USD".to_string(), 1.0 + n as f64 / 10.0)].into_iter().collect(),
            })
        }
    }

    #[test]
    fn test_next_delay_backoff() {
        let day = Duration::from_secs(86_400);
        assert_eq!(next_delay(day, 0), day);
        assert_eq!(next_delay(day, 1), Duration::from_secs(86_400 / 8 * 2));
        assert_eq!(next_delay(day, 10), Duration::from_secs(86_400 / 8 * 8));

        let short = Duration::from_secs(10);
        assert_eq!(next_delay(short, 1), Duration::from_secs(20));
    }

    #[test_log::test(tokio::test)]
    async fn test_zero_interval_fetches_once() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = CurrencyService::new(Some(provider.clone() as Arc<dyn CurrencyProvider>));
        let mut refresher = RateRefresher::spawn(service.clone(), Duration::ZERO);
        refresher.shutdown().await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!((service.get_rate("USD").unwrap().rate - 1.1).abs() < 1e-12);
        assert!(!refresher.is_running());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_periodic_refresh_until_shutdown() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = CurrencyService::new(Some(provider.clone() as Arc<dyn CurrencyProvider>));
        let mut refresher = RateRefresher::spawn(service.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(150)).await;
        refresher.shutdown().await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_failures_keep_loop_alive() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let service = CurrencyService::new(Some(provider.clone() as Arc<dyn CurrencyProvider>));
        let mut refresher = RateRefresher::spawn(service.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(refresher.is_running());
        refresher.shutdown().await;

        assert!(provider.calls.load(Ordering::SeqCst) >= 2);
        assert!(service.latest().is_empty());
    }
}
