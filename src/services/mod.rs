//! Evaluators and the services they depend on.
//!
//! - [`calculator`], [`percentages`], [`units`], [`time`], [`base_n`] - query handlers
//! - [`currency`] - exchange rate providers and background refresh
//! - [`lang`] - translation tables

pub mod base_n;
pub mod calculator;
pub mod currency;
pub mod format;
pub mod lang;
pub mod percentages;
pub mod time;
pub mod units;

pub use base_n::{BaseHandler, Radix};
pub use calculator::CalculatorHandler;
pub use currency::{CurrencyRate, CurrencyService, RateRefresher};
pub use lang::{LanguageService, Translator};
pub use percentages::PercentagesHandler;
pub use time::TimeHandler;
pub use units::UnitsHandler;
