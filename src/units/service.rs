//! Lifecycle of the shared unit registry.
//!
//! ```text
//! Disabled --enable()--> EnabledIdle --run()--> Running
//!     ^                      ^                     |
//!     +------disable()-------+-------stop()--------+
//! ```
//!
//! One `RwLock` guards the state, the registry and the rate subscription.
//! Queries read under it; rate updates and lifecycle transitions write under
//! it. Each registry carries a generation number and a rate callback only
//! touches the registry it was subscribed for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::definitions::DefinitionSource;
use super::registry::{UnitId, UnitRegistry, CURRENCY_PREFIX};
use crate::config::ConversionMode;
use crate::error::{CalcError, CalcResult};
use crate::services::currency::{CurrencyRate, CurrencyService, SubscriptionId};

/// Lifecycle state of the units service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceState {
    #[default]
    Disabled,
    EnabledIdle,
    Running,
}

#[derive(Debug, Default)]
struct Slot {
    state: ServiceState,
    registry: Option<UnitRegistry>,
    subscription: Option<SubscriptionId>,
    mode: ConversionMode,
}

struct Inner {
    slot: RwLock<Slot>,
    currency: CurrencyService,
    definitions: DefinitionSource,
    generations: AtomicU64,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rate-update callback body.
    fn on_rates(&self, generation: u64, rates: &[CurrencyRate]) {
        let mut slot = self.write();
        match slot.registry.as_mut() {
            Some(registry) if registry.generation() == generation => {
                apply_rates(registry, rates);
            }
            _ => debug!(generation, "Dropping rate update for a retired registry"),
        }
    }
}

/// Handle to the process-wide units service. Clones share the same registry.
#[derive(Clone)]
pub struct UnitsService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UnitsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.read();
        f.debug_struct("UnitsService")
            .field("state", &slot.state)
            .field("mode", &slot.mode)
            .field("generation", &slot.registry.as_ref().map(|r| r.generation()))
            .finish()
    }
}

impl UnitsService {
    pub fn new(currency: CurrencyService, definitions: DefinitionSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: RwLock::new(Slot::default()),
                currency,
                definitions,
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.inner.read().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    pub fn conversion_mode(&self) -> ConversionMode {
        self.inner.read().mode
    }

    pub fn set_conversion_mode(&self, mode: ConversionMode) {
        self.inner.write().mode = mode;
    }

    pub fn enable(&self) -> &Self {
        let mut slot = self.inner.write();
        if slot.state == ServiceState::Disabled {
            slot.state = ServiceState::EnabledIdle;
        }
        self
    }

    pub fn disable(&self) -> &Self {
        let mut slot = self.inner.write();
        self.teardown(&mut slot);
        slot.state = ServiceState::Disabled;
        self
    }

    /// Build the registry and start listening for rates.
    ///
    /// A no-op while running unless `force` asks for a rebuild. The new
    /// registry starts from the definition tables alone; currencies only
    /// appear once the rate source publishes. If the tables cannot be
    /// loaded the service stays idle and conversions report nothing.
    pub fn run(&self, force: bool) -> CalcResult<()> {
        let mut slot = self.inner.write();
        match slot.state {
            ServiceState::Disabled => {
                error!("Units service run() called while disabled");
                return Err(CalcError::Lifecycle(
                    "units service must be enabled before run()".to_string(),
                ));
            }
            ServiceState::Running if !force => return Ok(()),
            ServiceState::Running => self.teardown(&mut slot),
            ServiceState::EnabledIdle => {}
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let mut registry = UnitRegistry::new(generation);
        match self.inner.definitions.load_into(&mut registry) {
            Ok(applied) => debug!(generation, applied, "Unit definitions loaded"),
            Err(e) => {
                warn!("Unit conversion unavailable: {}", e);
                return Ok(());
            }
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = self.inner.currency.subscribe(Arc::new(move |rates| {
            if let Some(inner) = weak.upgrade() {
                inner.on_rates(generation, rates);
            }
        }));

        slot.registry = Some(registry);
        slot.subscription = Some(subscription);
        slot.state = ServiceState::Running;
        info!(generation, "Units service running");
        Ok(())
    }

    /// Drop the registry and stop listening for rates.
    pub fn stop(&self) -> &Self {
        let mut slot = self.inner.write();
        self.teardown(&mut slot);
        self
    }

    fn teardown(&self, slot: &mut Slot) {
        if let Some(id) = slot.subscription.take() {
            self.inner.currency.unsubscribe(id);
        }
        if let Some(registry) = slot.registry.take() {
            info!(generation = registry.generation(), "Units service stopped");
        }
        if slot.state == ServiceState::Running {
            slot.state = ServiceState::EnabledIdle;
        }
    }

    /// Read access to the registry. `None` means conversion is unavailable.
    pub fn with_registry<R>(&self, f: impl FnOnce(&UnitRegistry, ConversionMode) -> R) -> Option<R> {
        let slot = self.inner.read();
        slot.registry.as_ref().map(|registry| f(registry, slot.mode))
    }

    fn with_registry_mut<R>(&self, f: impl FnOnce(&mut UnitRegistry) -> R) -> CalcResult<R> {
        let mut slot = self.inner.write();
        match (slot.state, slot.registry.as_mut()) {
            (ServiceState::Running, Some(registry)) => Ok(f(registry)),
            (state, _) => {
                error!(?state, "Registry mutation outside of Running state");
                Err(CalcError::Lifecycle(format!(
                    "registry cannot be modified while {:?}",
                    state
                )))
            }
        }
    }

    /// Define a currency unit in the running registry.
    pub fn define_currency(&self, code: &str) -> CalcResult<UnitId> {
        self.with_registry_mut(|registry| registry.define_currency(code))
    }

    /// Redefine the base-currency factor of `code` in the running registry.
    pub fn redefine_rate(&self, code: &str, factor: f64) -> CalcResult<bool> {
        self.with_registry_mut(|registry| registry.redefine_rate(code, factor))
    }

    /// Apply a batch of rates as if it came from the rate source.
    pub fn update_rates(&self, rates: &[CurrencyRate]) -> CalcResult<()> {
        self.with_registry_mut(|registry| apply_rates(registry, rates))
    }

    /// Timestamp of the rate behind a currency unit such as `currency_USD`.
    pub fn get_rate_timestamp(&self, unit: &str) -> Option<DateTime<Utc>> {
        let code = unit.strip_prefix(CURRENCY_PREFIX).unwrap_or(unit);
        self.inner.currency.get_rate_timestamp(code)
    }
}

/// Fold a batch of rates into the registry.
///
/// Unknown codes are defined first; the base currency is never redefined;
/// every other code gets `1 / rate` base units, replacing any previous rule.
fn apply_rates(registry: &mut UnitRegistry, rates: &[CurrencyRate]) {
    info!(count = rates.len(), "Updating currency registry");
    let base = registry.base_currency();
    for rate in rates {
        let id = registry.define_currency(&rate.code);
        if id == base {
            continue;
        }
        if !rate.rate.is_finite() || rate.rate <= 0.0 {
            warn!(code = %rate.code, rate = rate.rate, "Skipping invalid currency rate");
            continue;
        }
        registry.redefine_rate(&rate.code, 1.0 / rate.rate);
    }
    info!("Updated currency registry");
}
