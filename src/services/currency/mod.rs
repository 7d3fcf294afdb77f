//! Currency rate source.
//!
//! Providers fetch rate batches; [`CurrencyService`] keeps the most recent
//! rate per code and notifies subscribers. Every published rate is expressed
//! against the base currency: `rate` units of `code` equal one unit of
//! [`BASE_CURRENCY`]. Batches quoted against another base are rebased before
//! they are recorded.

pub mod providers;
pub mod refresh;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{CalcError, CalcResult};
use crate::units::BASE_CURRENCY;

pub use providers::{provider_from_config, CurrencyProvider, EcbProvider, FixerIoProvider};
pub use refresh::RateRefresher;

/// One received exchange rate. Superseded by newer records, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRate {
    pub code: String,
    /// Units of `code` per one unit of the base currency.
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// A provider response before rebasing.
#[derive(Debug, Clone, PartialEq)]
pub struct RateBatch {
    pub base: String,
    pub timestamp: DateTime<Utc>,
    /// Units of each code per one unit of `base`.
    pub rates: BTreeMap<String, f64>,
}

impl RateBatch {
    /// Re-express the batch against [`BASE_CURRENCY`].
    pub fn rebase(self) -> CalcResult<Vec<CurrencyRate>> {
        let base = self.base.to_uppercase();
        let mut rates: BTreeMap<String, f64> = self
            .rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        rates.insert(base.clone(), 1.0);

        let divisor = match rates.get(BASE_CURRENCY) {
            Some(rate) if rate.is_finite() && *rate > 0.0 => *rate,
            _ => {
                return Err(CalcError::Provider(format!(
                    "batch quoted in {} has no {} rate",
                    base, BASE_CURRENCY
                )))
            }
        };

        Ok(rates
            .into_iter()
            .map(|(code, rate)| CurrencyRate {
                code,
                rate: rate / divisor,
                timestamp: self.timestamp,
            })
            .collect())
    }
}

/// Callback invoked with every published batch.
pub type RateCallback = Arc<dyn Fn(&[CurrencyRate]) + Send + Sync + 'static>;

/// Token returned by [`CurrencyService::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    provider: Option<Arc<dyn CurrencyProvider>>,
    rates: RwLock<BTreeMap<String, CurrencyRate>>,
    subscribers: Mutex<Vec<(SubscriptionId, RateCallback)>>,
    /// Held for a whole publish so stores and notifications keep one order.
    publishing: Mutex<()>,
    next_id: AtomicU64,
}

/// Shared handle to the rate source.
#[derive(Clone)]
pub struct CurrencyService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CurrencyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyService")
            .field("provider", &self.inner.provider.as_ref().map(|p| p.name()))
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl CurrencyService {
    pub fn new(provider: Option<Arc<dyn CurrencyProvider>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                rates: RwLock::new(BTreeMap::new()),
                subscribers: Mutex::new(Vec::new()),
                publishing: Mutex::new(()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe(&self, callback: RateCallback) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers().push((id, callback));
        debug!(?id, "Rate subscriber added");
        id
    }

    /// Remove a subscriber. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, RateCallback)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a provider batch and notify subscribers.
    pub fn publish(&self, batch: RateBatch) -> CalcResult<usize> {
        let rates = batch.rebase()?;
        Ok(self.publish_rates(rates))
    }

    /// Record already-rebased rates and notify subscribers.
    ///
    /// Publishes are serialized, so subscribers see batches in the order they
    /// were stored. Subscribers run on the calling thread without the rate or
    /// subscriber locks held.
    pub fn publish_rates(&self, rates: Vec<CurrencyRate>) -> usize {
        let _publishing = self
            .inner
            .publishing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let rates: Vec<CurrencyRate> = rates
            .into_iter()
            .map(|mut rate| {
                rate.code = rate.code.to_uppercase();
                rate
            })
            .collect();
        {
            let mut stored = self
                .inner
                .rates
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for rate in &rates {
                stored.insert(rate.code.clone(), rate.clone());
            }
        }

        let callbacks: Vec<RateCallback> = self
            .subscribers()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &callbacks {
            callback(&rates);
        }
        info!(
            count = rates.len(),
            subscribers = callbacks.len(),
            "Published currency rates"
        );
        rates.len()
    }

    /// Most recent rate for every known code.
    pub fn latest(&self) -> Vec<CurrencyRate> {
        self.inner
            .rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn get_rate(&self, code: &str) -> Option<CurrencyRate> {
        self.inner
            .rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&code.to_uppercase())
            .cloned()
    }

    pub fn get_rate_timestamp(&self, code: &str) -> Option<DateTime<Utc>> {
        self.get_rate(code).map(|rate| rate.timestamp)
    }

    /// Forget every recorded rate.
    pub fn clear(&self) {
        self.inner
            .rates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Fetch one batch from the provider and publish it.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let provider = self
            .inner
            .provider
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no currency provider configured"))?;
        let batch = provider.fetch_rates().await?;
        debug!(provider = provider.name(), base = %batch.base, "Fetched currency rates");
        match self.publish(batch) {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(provider = provider.name(), "Rejected rate batch: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn batch(base: &str, rates: &[(&str, f64)]) -> RateBatch {
        RateBatch {
            base: base.to_string(),
            timestamp: Utc::now(),
            rates: rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        }
    }

    #[test]
    fn test_rebase_from_eur_is_identity() {
        let rates = batch("EUR", &[("USD", 1.1)]).rebase().unwrap();
        let codes: Vec<(&str, f64)> = rates.iter().map(|r| (r.code.as_str(), r.rate)).collect();
        assert_eq!(codes, vec![("EUR", 1.0), ("USD", 1.1)]);
    }

    #[test]
    fn test_rebase_from_usd() {
        // 1 USD = 0.5 EUR, so 1 EUR = 2 USD and 1 EUR = 1.6 GBP.
        let rates = batch("usd", &[("EUR", 0.5), ("GBP", 0.8)]).rebase().unwrap();
        let get = |code: &str| rates.iter().find(|r| r.code == code).unwrap().rate;
        assert!((get("EUR") - 1.0).abs() < 1e-12);
        assert!((get("USD") - 2.0).abs() < 1e-12);
        assert!((get("GBP") - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_rebase_without_eur_fails() {
        assert!(matches!(
            batch("USD", &[("GBP", 0.8)]).rebase(),
            Err(CalcError::Provider(_))
        ));
    }

    #[test]
    fn test_subscribe_publish_unsubscribe() {
        let service = CurrencyService::new(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = service.subscribe(Arc::new(move |rates| {
            seen.fetch_add(rates.len(), Ordering::SeqCst);
        }));

        service.publish(batch("EUR", &[("USD", 1.1)])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(service.unsubscribe(id));
        assert!(!service.unsubscribe(id));
        service.publish(batch("EUR", &[("USD", 1.2)])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.get_rate("usd").unwrap().rate, 1.2);
    }

    #[test]
    fn test_subscriber_may_call_back_into_service() {
        let service = CurrencyService::new(None);
        let handle = service.clone();
        service.subscribe(Arc::new(move |_| {
            // The rate and subscriber locks are free while callbacks run.
            assert_eq!(handle.subscriber_count(), 1);
            assert!(handle.get_rate("USD").is_some());
        }));
        service.publish(batch("EUR", &[("USD", 1.1)])).unwrap();
    }

    #[test]
    fn test_latest_keeps_newest_per_code() {
        let service = CurrencyService::new(None);
        service.publish(batch("EUR", &[("USD", 1.1), ("GBP", 0.9)])).unwrap();
        service.publish(batch("EUR", &[("USD", 1.2)])).unwrap();
        let latest = service.latest();
        let usd = latest.iter().find(|r| r.code == "USD").unwrap();
        assert_eq!(usd.rate, 1.2);
        assert_eq!(latest.len(), 3);

        service.clear();
        assert!(service.latest().is_empty());
    }

    #[test]
    fn test_concurrent_publishes_notify_in_store_order() {
        let service = CurrencyService::new(None);
        let last_seen = Arc::new(Mutex::new(None::<f64>));
        let sink = Arc::clone(&last_seen);
        service.subscribe(Arc::new(move |rates| {
            if let Some(usd) = rates.iter().find(|r| r.code == "USD") {
                std::thread::yield_now();
                *sink.lock().unwrap() = Some(usd.rate);
            }
        }));

        let writers: Vec<_> = (0..2)
            .map(|writer| {
                let service = service.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let value = 1.0 + (writer * 1000 + i) as f64 / 10_000.0;
                        service.publish_rates(vec![CurrencyRate {
                            code: "USD".to_string(),
                            rate: value,
                            timestamp: Utc::now(),
                        }]);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = service.get_rate("USD").unwrap().rate;
        assert_eq!(*last_seen.lock().unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_refresh_without_provider_fails() {
        let service = CurrencyService::new(None);
        assert!(service.refresh().await.is_err());
    }
}
