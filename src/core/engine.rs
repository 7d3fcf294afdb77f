//! The query engine: dispatch, evaluation and presentation for one host.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::handler::{HandlerKind, MultiHandler, QueryHandler};
use super::present::{placeholder, present, Item};
use super::query::{dispatch, QueryMode, Trigger};
use crate::config::Config;
use crate::error::CalcResult;
use crate::services::base_n::{BaseHandler, Radix};
use crate::services::calculator::CalculatorHandler;
use crate::services::currency::CurrencyService;
use crate::services::lang::{LanguageService, Translator};
use crate::services::percentages::PercentagesHandler;
use crate::services::time::TimeHandler;
use crate::services::units::UnitsHandler;
use crate::units::{DefinitionSource, UnitsService};

struct Handlers {
    units: UnitsHandler,
    calculator: CalculatorHandler,
    percentages: PercentagesHandler,
    time: TimeHandler,
    base10: BaseHandler,
    base2: BaseHandler,
    base8: BaseHandler,
    base16: BaseHandler,
}

impl Handlers {
    fn get(&self, kind: HandlerKind) -> &dyn QueryHandler {
        match kind {
            HandlerKind::Units => &self.units,
            HandlerKind::Calculator => &self.calculator,
            HandlerKind::Percentages => &self.percentages,
            HandlerKind::Time => &self.time,
            HandlerKind::Base10 => &self.base10,
            HandlerKind::Base2 => &self.base2,
            HandlerKind::Base8 => &self.base8,
            HandlerKind::Base16 => &self.base16,
        }
    }
}

/// Owns the preferences, services and handlers behind [`Engine::query`].
pub struct Engine {
    config: Config,
    triggers: Vec<Trigger>,
    currency: CurrencyService,
    units: UnitsService,
    translator: Arc<LanguageService>,
    handlers: Handlers,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("triggers", &self.triggers)
            .field("units", &self.units)
            .field("currency", &self.currency)
            .finish()
    }
}

impl Engine {
    /// Build an engine around a rate source. The units service starts disabled.
    pub fn new(config: Config, currency: CurrencyService) -> Self {
        let definitions_dir = config.units.definitions_dir.clone();
        let translator = Arc::new(LanguageService::load(
            &config.general.language,
            definitions_dir.as_deref(),
        ));
        let units = UnitsService::new(currency.clone(), DefinitionSource::from_dir(definitions_dir));
        units.set_conversion_mode(config.units.mode);

        let shared: Arc<dyn Translator> = translator.clone();
        let handlers = Handlers {
            units: UnitsHandler::new(
                units.clone(),
                config.currency.default_currencies.clone(),
                Arc::clone(&shared),
            ),
            calculator: CalculatorHandler,
            percentages: PercentagesHandler,
            time: TimeHandler::new(&config.time.cities),
            base10: BaseHandler::new(Radix::Decimal, Arc::clone(&shared)),
            base2: BaseHandler::new(Radix::Binary, Arc::clone(&shared)),
            base8: BaseHandler::new(Radix::Octal, Arc::clone(&shared)),
            base16: BaseHandler::new(Radix::Hexadecimal, shared),
        };

        Self {
            triggers: Trigger::from_keywords(config.general.triggers.as_slice()),
            config,
            currency,
            units,
            translator,
            handlers,
        }
    }

    /// Enable the units service and build its registry.
    pub fn start(&self) -> CalcResult<()> {
        self.units.enable();
        self.units.run(false)
    }

    /// Drop the registry and stop listening for rates.
    pub fn shutdown(&self) {
        self.units.disable();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn units(&self) -> &UnitsService {
        &self.units
    }

    pub fn currency(&self) -> &CurrencyService {
        &self.currency
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Answer one raw query.
    #[instrument(skip(self), level = "debug")]
    pub fn query(&self, raw: &str) -> Vec<Item> {
        let show_placeholder = self.config.general.show_empty_placeholder;
        let icon_dir = self.config.general.icon_dir.as_path();

        if raw.trim().is_empty() && !show_placeholder {
            return Vec::new();
        }

        let Some(query) = dispatch(raw.trim_start(), &self.triggers) else {
            debug!("No trigger matched");
            return if show_placeholder {
                vec![placeholder(QueryMode::Calculator, self.translator(), icon_dir)]
            } else {
                Vec::new()
            };
        };

        let handlers: Vec<&dyn QueryHandler> = query
            .mode
            .handlers()
            .iter()
            .map(|kind| self.handlers.get(*kind))
            .collect();
        let results = MultiHandler::new().handle(&query, &handlers);

        if results.is_empty() && (query.argument.trim().is_empty() || show_placeholder) {
            return vec![placeholder(query.mode, self.translator(), icon_dir)];
        }
        present(results, icon_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::currency::CurrencyRate;
    use chrono::Utc;

    fn engine(configure: impl FnOnce(&mut Config)) -> Engine {
        let mut config = Config::default();
        configure(&mut config);
        let engine = Engine::new(config, CurrencyService::new(None));
        engine.start().unwrap();
        engine
    }

    #[test]
    fn test_hex_trigger_runs_only_hex_handler() {
        let items = engine(|_| {}).query("hex 255");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "FF");
    }

    #[test]
    fn test_empty_input_without_placeholder() {
        let engine = engine(|_| {});
        assert!(engine.query("").is_empty());
        assert!(engine.query("   ").is_empty());
    }

    #[test]
    fn test_empty_input_with_placeholder() {
        let items = engine(|c| c.general.show_empty_placeholder = true).query("");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "calculate_anything_no_result");
    }

    #[test]
    fn test_trigger_without_argument_shows_mode_placeholder() {
        let engine = engine(|_| {});
        let items = engine.query("hex ");
        assert_eq!(items.len(), 1);
        assert_eq!(
            Some(items[0].subtext.clone()),
            engine
                .translator()
                .translate("no-result-hex-description", "misc")
        );
    }

    #[test]
    fn test_unmatched_input_respects_flag() {
        assert!(engine(|_| {}).query("2+2").is_empty());
        let items = engine(|c| c.general.show_empty_placeholder = true).query("2+2");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "calculate_anything_no_result");
    }

    #[test]
    fn test_bare_calculator_without_triggers() {
        let items = engine(|c| c.general.triggers.clear()).query("2+2");
        assert!(items.iter().any(|item| item.text == "= 4"));
    }

    #[test]
    fn test_currency_through_trigger() {
        let engine = engine(|_| {});
        engine.currency().publish_rates(vec![CurrencyRate {
            code: "USD".to_string(),
            rate: 1.10,
            timestamp: Utc::now(),
        }]);
        let items = engine.query("= 10 USD to EUR");
        assert_eq!(items[0].text, "9.090909 EUR");
    }

    #[test]
    fn test_conversion_mode_from_config() {
        let engine = engine(|c| c.units.mode = crate::config::ConversionMode::Crazy);
        let items = engine.query("= 1 kg to l");
        assert_eq!(items[0].text, "1 L");
    }

    #[test]
    fn test_shutdown_disables_units() {
        let engine = engine(|_| {});
        engine.shutdown();
        assert!(engine.query("= 1 km to m").is_empty());
        assert!(!engine.units().is_running());
    }
}
