//! anycalc - calculate anything from a single line of text.
//!
//! anycalc answers free-text queries: arithmetic, percentages, number bases,
//! time zones and timestamps, measurement units and live currency rates.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`config`] - Configuration loading and management
//! - [`core`] - Trigger dispatch, the handler orchestrator and result items
//! - [`units`] - Unit registry, definition tables and the registry lifecycle
//! - [`services`] - Evaluators, currency rate providers and translations
//! - [`cli`] - The `anycalc` command-line host
//!
//! # Example
//!
//! ```no_run
//! use anycalc::{Config, CurrencyService, Engine};
//!
//! let engine = Engine::new(Config::load(), CurrencyService::new(None));
//! engine.start().expect("unit definitions");
//!
//! for item in engine.query("= 10 km to mi") {
//!     println!("{} ({})", item.text, item.subtext);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod services;
pub mod units;

mod error;

pub use crate::core::{Engine, Item, Query, QueryMode, QueryResult, Trigger};
pub use config::Config;
pub use error::{CalcError, CalcResult};
pub use services::currency::CurrencyService;
pub use units::{UnitRegistry, UnitsService};
